use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{MessageEntity, MessageId, ReplyParameters};
use tracing::{error, info, warn};

use crate::bot::AppState;
use crate::commands::{self, Command};
use crate::editing::{self, EditAttempt, PostEditor, PostField};
use crate::platform::IncomingPost;

/// Split long messages for Telegram's 4096 char limit
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

impl From<&Message> for IncomingPost {
    fn from(msg: &Message) -> Self {
        Self {
            chat_id: msg.chat.id.0,
            username: msg.chat.username().map(str::to_string),
            message_id: msg.id.0,
            text: msg.text().map(str::to_string),
            caption: msg.caption().map(str::to_string),
        }
    }
}

/// Edits one channel post through the Bot API
struct TelegramPostEditor {
    bot: Bot,
    chat_id: ChatId,
    message_id: MessageId,
    entities: Option<Vec<MessageEntity>>,
}

impl TelegramPostEditor {
    fn new(bot: Bot, msg: &Message, field: PostField) -> Self {
        let entities = match field {
            PostField::Text => msg.entities(),
            PostField::Caption => msg.caption_entities(),
        };
        Self {
            bot,
            chat_id: msg.chat.id,
            message_id: msg.id,
            entities: entities.map(<[MessageEntity]>::to_vec),
        }
    }

    fn entities_for(&self, attempt: EditAttempt) -> Option<Vec<MessageEntity>> {
        match attempt {
            EditAttempt::Direct => self.entities.clone(),
            EditAttempt::Plain => None,
        }
    }
}

#[async_trait]
impl PostEditor for TelegramPostEditor {
    async fn edit(&self, attempt: EditAttempt, field: PostField, text: &str) -> Result<()> {
        let entities = self.entities_for(attempt);
        match field {
            PostField::Text => {
                let mut request = self
                    .bot
                    .edit_message_text(self.chat_id, self.message_id, text);
                if let Some(entities) = entities {
                    request = request.entities(entities);
                }
                request.await?;
            }
            PostField::Caption => {
                let mut request = self
                    .bot
                    .edit_message_caption(self.chat_id, self.message_id)
                    .caption(text);
                if let Some(entities) = entities {
                    request = request.caption_entities(entities);
                }
                request.await?;
            }
        }
        Ok(())
    }

    async fn reply(&self, text: &str) -> Result<()> {
        self.bot
            .send_message(self.chat_id, text)
            .reply_parameters(ReplyParameters::new(self.message_id))
            .await?;
        Ok(())
    }
}

/// Run the Telegram bot platform
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let bot = Bot::new(&state.config.telegram.bot_token);

    info!("Starting Telegram platform...");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_command))
        .branch(Update::filter_channel_post().endpoint(handle_channel_post));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(command) = msg.text().and_then(Command::parse) else {
        return Ok(());
    };

    let user_id = msg.from.as_ref().map(|user| user.id.0);
    info!("Command from {:?} in chat {}: {:?}", user_id, msg.chat.id, command);

    let allowed = match user_id {
        Some(id) => state.config.is_admin(id),
        None => state.config.telegram.admin_user_ids.is_empty(),
    };
    let reply = if command.requires_admin() && !allowed {
        warn!("Rejected command from non-admin user {:?}", user_id);
        commands::NOT_ALLOWED_TEXT.to_string()
    } else {
        // store commands read and rewrite the JSON files
        let task = tokio::task::spawn_blocking(move || {
            commands::execute(command, &state.channels, &state.filters)
        });
        match task.await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Command task failed: {}", e);
                return Ok(());
            }
        }
    };

    for chunk in split_message(&reply, 4000) {
        bot.send_message(msg.chat.id, chunk).await?;
    }

    Ok(())
}

async fn handle_channel_post(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let post = IncomingPost::from(&msg);
    let message_id = post.message_id;

    let rewrite = {
        let state = state.clone();
        tokio::task::spawn_blocking(move || state.rewrite(&post)).await
    };
    let rewrite = match rewrite {
        Ok(Some(rewrite)) => rewrite,
        Ok(None) => return Ok(()),
        Err(e) => {
            error!("Processing task for message {} failed: {}", message_id, e);
            return Ok(());
        }
    };

    info!(
        "Text was changed, editing {:?} of message {}",
        rewrite.field, message_id
    );

    let editor = TelegramPostEditor::new(bot, &msg, rewrite.field);
    let outcome = editing::apply_edit(
        &editor,
        rewrite.field,
        &rewrite.text,
        state.config.processing.reply_on_edit_failure,
    )
    .await;

    info!("Message {} edit outcome: {:?}", message_id, outcome);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_is_one_chunk() {
        assert_eq!(split_message("hello", 4000), vec!["hello"]);
    }

    #[test]
    fn test_split_prefers_newlines() {
        let text = "line one\nline two\nline three";
        let chunks = split_message(text, 12);
        assert_eq!(chunks[0], "line one\n");
        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().all(|c| c.len() <= 12));
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let text = "🚀".repeat(10);
        let chunks = split_message(&text, 6);
        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().all(|c| c.len() <= 6));
    }
}
