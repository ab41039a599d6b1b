use anyhow::Result;
use std::path::PathBuf;
use tracing::{error, info};

use super::{JsonFile, Outcome};

/// Channels whose posts get rewritten. Entries are "@handle" or a numeric
/// chat id kept as a string.
#[derive(Debug)]
pub struct ChannelStore {
    file: JsonFile,
    default_channel: Option<String>,
}

/// Keep a leading "@" for handles; strip stray "@" from anything else.
fn normalize(channel_id: &str) -> String {
    if channel_id.starts_with('@') {
        channel_id.to_string()
    } else {
        channel_id.replace('@', "")
    }
}

impl ChannelStore {
    pub fn new(path: impl Into<PathBuf>, default_channel: Option<String>) -> Self {
        Self {
            file: JsonFile::new(path),
            default_channel,
        }
    }

    fn seed(&self) -> Vec<String> {
        self.default_channel.iter().cloned().collect()
    }

    /// A missing file is created from the default channel. A malformed file
    /// falls back to the default channel without being rewritten.
    fn load(&self) -> Vec<String> {
        match self.file.read::<Vec<String>>() {
            Ok(Some(channels)) => channels,
            Ok(None) => {
                let channels = self.seed();
                if let Err(e) = self.save(&channels) {
                    error!("Error creating channels file: {:#}", e);
                }
                channels
            }
            Err(e) => {
                error!(
                    "Error loading channels from {}: {:#}",
                    self.file.path().display(),
                    e
                );
                self.seed()
            }
        }
    }

    fn save(&self, channels: &[String]) -> Result<()> {
        self.file.write(&channels)
    }

    pub fn add(&self, channel_id: &str) -> Outcome {
        let _guard = self.file.lock();
        let mut channels = self.load();
        let normalized = normalize(channel_id);

        if channels.contains(&normalized) {
            return Outcome::failed("Channel already in monitoring list.");
        }

        channels.push(normalized.clone());
        match self.save(&channels) {
            Ok(()) => {
                info!("Channel added: {}", normalized);
                Outcome::ok(format!("Channel {} added to monitoring list.", normalized))
            }
            Err(e) => {
                error!("Error saving channels: {:#}", e);
                Outcome::failed("Failed to save channel.")
            }
        }
    }

    pub fn remove(&self, channel_id: &str) -> Outcome {
        let _guard = self.file.lock();
        let mut channels = self.load();
        let normalized = normalize(channel_id);

        let candidates = [
            normalized.clone(),
            format!("@{}", normalized),
            normalized.replace('@', ""),
        ];
        let position = candidates
            .iter()
            .find_map(|candidate| channels.iter().position(|c| c == candidate));

        let Some(index) = position else {
            return Outcome::failed(format!(
                "Channel {} not found in monitoring list.",
                channel_id
            ));
        };

        let removed = channels.remove(index);
        match self.save(&channels) {
            Ok(()) => {
                info!("Channel removed: {}", removed);
                Outcome::ok(format!(
                    "Channel {} removed from monitoring list.",
                    channel_id
                ))
            }
            Err(e) => {
                error!("Error saving channels: {:#}", e);
                Outcome::failed("Failed to save channel list.")
            }
        }
    }

    pub fn list(&self) -> String {
        let _guard = self.file.lock();
        let channels = self.load();
        if channels.is_empty() {
            return "No channels are being monitored.".to_string();
        }

        let mut result = String::from("Monitored channels:\n\n");
        for (i, channel) in channels.iter().enumerate() {
            result.push_str(&format!("{}. `{}`\n", i + 1, channel));
        }
        result
    }

    /// Whether posts from this chat should be processed. An empty list
    /// monitors everything.
    pub fn is_monitored(&self, chat_id: i64, username: Option<&str>) -> bool {
        let _guard = self.file.lock();
        let channels = self.load();
        if channels.is_empty() {
            return true;
        }

        let chat_id = chat_id.to_string();
        channels.iter().any(|entry| match entry.strip_prefix('@') {
            Some(handle) => username.is_some_and(|name| name.eq_ignore_ascii_case(handle)),
            None => *entry == chat_id,
        })
    }

    pub fn len(&self) -> usize {
        let _guard = self.file.lock();
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
