use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::editing::PostField;
use crate::platform::IncomingPost;
use crate::processor::TextProcessor;
use crate::store::channels::ChannelStore;
use crate::store::filters::FilterStore;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub channels: Arc<ChannelStore>,
    pub filters: Arc<FilterStore>,
    pub processor: TextProcessor,
}

/// The corrected content for one post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub field: PostField,
    pub text: String,
}

impl AppState {
    pub fn new(
        config: Config,
        channels: Arc<ChannelStore>,
        filters: Arc<FilterStore>,
        processor: TextProcessor,
    ) -> Self {
        Self {
            config,
            channels,
            filters,
            processor,
        }
    }

    /// Text wins over caption; each is subject to its processing toggle.
    fn select_content<'p>(&self, post: &'p IncomingPost) -> Option<(PostField, &'p str)> {
        let processing = &self.config.processing;
        match (post.text.as_deref(), post.caption.as_deref()) {
            (Some(text), _) if !text.is_empty() && processing.process_text => {
                Some((PostField::Text, text))
            }
            (_, Some(caption)) if !caption.is_empty() && processing.process_captions => {
                Some((PostField::Caption, caption))
            }
            _ => None,
        }
    }

    /// Decide whether a post needs editing and produce the new content.
    pub fn rewrite(&self, post: &IncomingPost) -> Option<Rewrite> {
        if !self
            .channels
            .is_monitored(post.chat_id, post.username.as_deref())
        {
            info!("Ignoring message from non-monitored channel: {}", post.chat_id);
            return None;
        }

        info!(
            "Processing message {} from channel {}",
            post.message_id, post.chat_id
        );

        let (field, original) = self.select_content(post)?;
        let processed = self.processor.process(original);

        if processed == original {
            debug!("No changes needed for message {}", post.message_id);
            return None;
        }

        Some(Rewrite {
            field,
            text: processed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TimestampConfig, TimezoneConfig};
    use crate::processor::timestamps::TimestampConverter;
    use crate::store::filters::FilterRule;
    use tempfile::TempDir;

    fn state(dir: &TempDir, config: Config) -> AppState {
        let channels = Arc::new(ChannelStore::new(dir.path().join("channels.json"), None));
        let filters = Arc::new(FilterStore::new(
            dir.path().join("filters.json"),
            vec![FilterRule::new("foo", "bar")],
        ));
        let timestamps =
            TimestampConverter::new(&TimezoneConfig::default(), &TimestampConfig::default())
                .unwrap();
        let processor = TextProcessor::new(filters.clone(), timestamps);
        AppState::new(config, channels, filters, processor)
    }

    fn post(text: Option<&str>, caption: Option<&str>) -> IncomingPost {
        IncomingPost {
            chat_id: -1001,
            username: Some("news".to_string()),
            message_id: 7,
            text: text.map(str::to_string),
            caption: caption.map(str::to_string),
        }
    }

    #[test]
    fn test_text_rewrite() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Config::default());
        assert_eq!(
            state.rewrite(&post(Some("foo!"), None)),
            Some(Rewrite {
                field: PostField::Text,
                text: "bar!".to_string()
            })
        );
    }

    #[test]
    fn test_caption_rewrite() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Config::default());
        let rewrite = state.rewrite(&post(None, Some("foo photo"))).unwrap();
        assert_eq!(rewrite.field, PostField::Caption);
        assert_eq!(rewrite.text, "bar photo");
    }

    #[test]
    fn test_unchanged_post_needs_no_edit() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Config::default());
        assert_eq!(state.rewrite(&post(Some("nothing to do"), None)), None);
    }

    #[test]
    fn test_toggles_disable_processing() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.processing.process_text = false;
        config.processing.process_captions = false;
        let state = state(&dir, config);
        assert_eq!(state.rewrite(&post(Some("foo"), None)), None);
        assert_eq!(state.rewrite(&post(None, Some("foo"))), None);
    }

    #[test]
    fn test_unmonitored_channel_is_ignored() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir, Config::default());
        state.channels.add("@elsewhere");
        assert_eq!(state.rewrite(&post(Some("foo"), None)), None);

        state.channels.add("@News");
        assert!(state.rewrite(&post(Some("foo"), None)).is_some());
    }
}
