use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::store::filters::FilterRule;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub timezone: TimezoneConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub timestamps: TimestampConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Channel seeded into a fresh channel file, "@handle" or numeric id
    #[serde(default)]
    pub default_channel: Option<String>,
    /// Users allowed to run management commands. Empty means everyone.
    #[serde(default)]
    pub admin_user_ids: Vec<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimezoneConfig {
    /// IANA name the timestamps in posts are written in
    #[serde(default = "default_source_timezone")]
    pub source: String,
    /// IANA name timestamps are rewritten into
    #[serde(default = "default_target_timezone")]
    pub target: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FiltersConfig {
    /// Rules applied before any user-defined filter. Not editable at runtime.
    #[serde(default = "default_builtin_filters")]
    pub builtin: Vec<FilterRule>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimestampConfig {
    #[serde(default = "default_primary_pattern")]
    pub primary_pattern: String,
    /// Tried in order only when the primary pattern finds nothing
    #[serde(default = "default_fallback_patterns")]
    pub fallback_patterns: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingConfig {
    #[serde(default = "default_true")]
    pub process_text: bool,
    #[serde(default = "default_true")]
    pub process_captions: bool,
    #[serde(default = "default_true")]
    pub reply_on_edit_failure: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_channels_file")]
    pub channels_file: PathBuf,
    #[serde(default = "default_filters_file")]
    pub filters_file: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatusConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_source_timezone() -> String {
    // UTC+14:00; the Etc zones use the inverted POSIX sign
    "Etc/GMT-14".to_string()
}

fn default_target_timezone() -> String {
    "Asia/Kolkata".to_string()
}

fn default_builtin_filters() -> Vec<FilterRule> {
    [
        (r"(?i)\b(urgent)\b", "URGENT"),
        (r"(?i)\b(important)\b", "IMPORTANT"),
        (r"@Gazew_07", "@BILLIONAIREBOSS101"),
        ("🚧", "🚀"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| FilterRule::new(pattern, replacement))
    .collect()
}

fn default_primary_pattern() -> String {
    r"(\d{1,2}[/.:-]\d{1,2}[/.:-]\d{2,4}\s+\d{1,2}:\d{2}(?::\d{2})?(?:\s*(?:AM|PM|am|pm))?)"
        .to_string()
}

fn default_fallback_patterns() -> Vec<String> {
    vec![
        // time only, e.g. 12:30 PM
        r"(\d{1,2}:\d{2}(?::\d{2})?(?:\s*(?:AM|PM|am|pm))?)".to_string(),
        // date only, e.g. 01/15/2023
        r"(\d{1,2}[/.:-]\d{1,2}[/.:-]\d{2,4})".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

fn default_channels_file() -> PathBuf {
    PathBuf::from("monitored_channels.json")
}

fn default_filters_file() -> PathBuf {
    PathBuf::from("user_filters.json")
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            source: default_source_timezone(),
            target: default_target_timezone(),
        }
    }
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            builtin: default_builtin_filters(),
        }
    }
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            primary_pattern: default_primary_pattern(),
            fallback_patterns: default_fallback_patterns(),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            process_text: true,
            process_captions: true,
            reply_on_edit_failure: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            channels_file: default_channels_file(),
            filters_file: default_filters_file(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load the TOML file at `path`, falling back to defaults when it does not
    /// exist, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            info!(
                "Config file {} not found, using defaults and environment",
                path.display()
            );
            Config::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML configuration")
    }

    /// `TELEGRAM_BOT_TOKEN`, `CHANNEL_ID` and `PORT` win over the file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN").filter(|t| !t.is_empty()) {
            self.telegram.bot_token = token;
        }
        if let Some(channel) = lookup("CHANNEL_ID").filter(|c| !c.is_empty()) {
            self.telegram.default_channel = Some(channel);
        }
        if let Some(port) = lookup("PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.status.port = port,
                Err(e) => warn!("Ignoring invalid PORT '{}': {}", port, e),
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!(
                "No bot token provided. Set telegram.bot_token or the TELEGRAM_BOT_TOKEN environment variable."
            );
        }
        for rule in &self.filters.builtin {
            if let Err(e) = regex::Regex::new(&rule.pattern) {
                warn!(
                    "Built-in filter '{}' does not compile and will be skipped: {}",
                    rule.pattern, e
                );
            }
        }
        Ok(())
    }

    pub fn default_channel(&self) -> Option<&str> {
        self.telegram
            .default_channel
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    pub fn is_admin(&self, user_id: u64) -> bool {
        self.telegram.admin_user_ids.is_empty() || self.telegram.admin_user_ids.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_match_original_bot() {
        let config = Config::default();
        assert_eq!(config.timezone.source, "Etc/GMT-14");
        assert_eq!(config.timezone.target, "Asia/Kolkata");
        assert_eq!(config.filters.builtin.len(), 4);
        assert_eq!(config.filters.builtin[0].replacement, "URGENT");
        assert_eq!(config.timestamps.fallback_patterns.len(), 2);
        assert!(config.processing.process_text);
        assert!(config.processing.process_captions);
        assert!(config.processing.reply_on_edit_failure);
        assert_eq!(
            config.storage.channels_file,
            PathBuf::from("monitored_channels.json")
        );
        assert_eq!(config.status.port, 5000);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.timezone.source, "Etc/GMT-14");
        assert_eq!(config.filters.builtin.len(), 4);
    }

    #[test]
    fn test_toml_sections_override_defaults() {
        let config = Config::from_toml(
            r#"
[telegram]
bot_token = "123:abc"
default_channel = "@news"
admin_user_ids = [42]

[timezone]
source = "UTC"
target = "Europe/Berlin"

[[filters.builtin]]
pattern = "foo"
replacement = "bar"

[processing]
process_captions = false

[status]
port = 8080
"#,
        )
        .unwrap();

        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.default_channel(), Some("@news"));
        assert_eq!(config.timezone.target, "Europe/Berlin");
        assert_eq!(config.filters.builtin, vec![FilterRule::new("foo", "bar")]);
        assert!(config.processing.process_text);
        assert!(!config.processing.process_captions);
        assert_eq!(config.status.port, 8080);
        assert_eq!(config.status.bind_address, "0.0.0.0");
        assert!(config.is_admin(42));
        assert!(!config.is_admin(7));
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("TELEGRAM_BOT_TOKEN", "999:xyz"),
            ("CHANNEL_ID", "-1001234567890"),
            ("PORT", "9000"),
        ]);
        let mut config = Config::default();
        config.apply_env_overrides(|k| vars.get(k).cloned());

        assert_eq!(config.telegram.bot_token, "999:xyz");
        assert_eq!(config.default_channel(), Some("-1001234567890"));
        assert_eq!(config.status.port, 9000);
    }

    #[test]
    fn test_invalid_port_env_is_ignored() {
        let vars = env(&[("PORT", "not-a-port")]);
        let mut config = Config::default();
        config.apply_env_overrides(|k| vars.get(k).cloned());
        assert_eq!(config.status.port, 5000);
    }

    #[test]
    fn test_missing_token_fails_validation() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bot token"));
    }

    #[test]
    fn test_empty_admin_list_allows_everyone() {
        let config = Config::default();
        assert!(config.is_admin(1));
    }

    #[test]
    fn test_blank_default_channel_is_none() {
        let mut config = Config::default();
        config.telegram.default_channel = Some("  ".to_string());
        assert_eq!(config.default_channel(), None);
    }
}
