use regex::Regex;

use crate::store::channels::ChannelStore;
use crate::store::filters::FilterStore;
use crate::store::Outcome;

pub const START_TEXT: &str = "Hi! I'm a channel message editor bot. I automatically edit messages in the configured channel.\n\
Add me to your channel as an admin with edit permissions to get started.";

pub const HELP_TEXT: &str = "How to use this bot:\n\
1. Add this bot to your channel as an admin\n\
2. Give it permission to post and edit messages\n\
3. Add your channel to the bot's monitoring list\n\
4. The bot will automatically edit new messages to apply text filters and convert timestamps\n\n\
Channel management commands:\n\
/channels - List all monitored channels\n\
/addchannel channel_id - Add a channel to monitor\n\
/removechannel channel_id - Remove a channel from monitoring\n\n\
Filter management commands:\n\
/filters - List all current text filters\n\
/addfilter pattern replacement - Add a new filter\n\
/removefilter pattern - Remove a filter\n\
/testfilter sample_text regex_pattern - Test a regex pattern on sample text";

const ADD_FILTER_USAGE: &str = "❌ Usage: /addfilter pattern replacement\n\n\
Example: /addfilter (?i)\\b(hello)\\b HELLO\n\n\
This would replace all instances of 'hello' (case insensitive) with 'HELLO'";

const REMOVE_FILTER_USAGE: &str = "❌ Usage: /removefilter pattern\n\n\
Example: /removefilter (?i)\\b(hello)\\b\n\n\
Use /filters to see all available filters and their patterns.";

const TEST_FILTER_USAGE: &str = "❌ Usage: /testfilter sample_text pattern\n\n\
Example: /testfilter \"Hello world\" (?i)\\b(hello)\\b\n\n\
This tests if the pattern matches the sample text.";

const ADD_CHANNEL_USAGE: &str = "❌ Usage: /addchannel channel_id\n\n\
Example: /addchannel @mychannel\n\
Example: /addchannel -1001234567890\n\n\
You can use either the channel username (with @) or the channel ID.";

const REMOVE_CHANNEL_USAGE: &str = "❌ Usage: /removechannel channel_id\n\n\
Example: /removechannel @mychannel\n\
Example: /removechannel -1001234567890\n\n\
Use /channels to see all monitored channels.";

pub const NOT_ALLOWED_TEXT: &str = "❌ You are not allowed to manage this bot.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Channels,
    AddChannel(String),
    RemoveChannel(String),
    Filters,
    AddFilter { pattern: String, replacement: String },
    RemoveFilter(String),
    TestFilter { sample: String, pattern: String },
    /// Recognized command with missing arguments
    Usage(&'static str),
}

impl Command {
    /// Parse "/name[@bot] args...". Returns `None` for anything that is not
    /// one of our commands.
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.trim().strip_prefix('/')?;
        let mut parts = rest.split_whitespace();
        let head = parts.next()?;
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let args: Vec<&str> = parts.collect();

        let command = match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "channels" => Command::Channels,
            "filters" => Command::Filters,
            "addchannel" => match args.first() {
                Some(id) => Command::AddChannel(id.to_string()),
                None => Command::Usage(ADD_CHANNEL_USAGE),
            },
            "removechannel" => match args.first() {
                Some(id) => Command::RemoveChannel(id.to_string()),
                None => Command::Usage(REMOVE_CHANNEL_USAGE),
            },
            "addfilter" => match args.split_first() {
                Some((pattern, replacement)) if !replacement.is_empty() => Command::AddFilter {
                    pattern: pattern.to_string(),
                    replacement: replacement.join(" "),
                },
                _ => Command::Usage(ADD_FILTER_USAGE),
            },
            "removefilter" => match args.first() {
                Some(pattern) => Command::RemoveFilter(pattern.to_string()),
                None => Command::Usage(REMOVE_FILTER_USAGE),
            },
            "testfilter" => match args.split_last() {
                Some((pattern, sample)) if !sample.is_empty() => Command::TestFilter {
                    sample: unquote(&sample.join(" ")).to_string(),
                    pattern: pattern.to_string(),
                },
                _ => Command::Usage(TEST_FILTER_USAGE),
            },
            _ => return None,
        };
        Some(command)
    }

    /// Commands that read or change the stores
    pub fn requires_admin(&self) -> bool {
        !matches!(self, Command::Start | Command::Help)
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

fn outcome_reply(outcome: Outcome) -> String {
    if outcome.ok {
        format!("✅ {}", outcome.message)
    } else {
        format!("❌ {}", outcome.message)
    }
}

/// Run a command against the stores and produce the reply text.
pub fn execute(command: Command, channels: &ChannelStore, filters: &FilterStore) -> String {
    match command {
        Command::Start => START_TEXT.to_string(),
        Command::Help => HELP_TEXT.to_string(),
        Command::Usage(usage) => usage.to_string(),
        Command::Channels => channels.list(),
        Command::AddChannel(id) => outcome_reply(channels.add(&id)),
        Command::RemoveChannel(id) => outcome_reply(channels.remove(&id)),
        Command::Filters => filters.list(),
        Command::AddFilter {
            pattern,
            replacement,
        } => {
            if let Err(e) = Regex::new(&pattern) {
                return format!("❌ Invalid regular expression: {}", e);
            }
            if filters.add(&pattern, &replacement) {
                format!(
                    "✅ Filter added successfully!\n\nPattern: `{}`\nReplacement: `{}`",
                    pattern, replacement
                )
            } else {
                "❌ Failed to add filter.".to_string()
            }
        }
        Command::RemoveFilter(pattern) => {
            if filters.remove(&pattern) {
                format!("✅ Filter with pattern `{}` removed.", pattern)
            } else {
                format!("❌ No filter found with pattern: `{}`", pattern)
            }
        }
        Command::TestFilter { sample, pattern } => {
            format!("Test result:\n\n{}", filters.test(&sample, &pattern))
        }
    }
}
