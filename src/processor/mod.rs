pub mod timestamps;

use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::store::filters::{FilterRule, FilterStore};
use timestamps::TimestampConverter;

/// Rewrites a post: filter substitution first, then timestamp conversion on
/// the filtered text. Holds no state between calls beyond the filter file.
pub struct TextProcessor {
    filters: Arc<FilterStore>,
    timestamps: TimestampConverter,
}

impl TextProcessor {
    pub fn new(filters: Arc<FilterStore>, timestamps: TimestampConverter) -> Self {
        Self {
            filters,
            timestamps,
        }
    }

    pub fn process(&self, text: &str) -> String {
        if text.is_empty() {
            return text.to_string();
        }

        let filtered = apply_filters(&self.filters.get_all(), text);
        let processed = self.timestamps.convert(&filtered);

        if processed != text {
            info!("Processed text: '{}' -> '{}'", text, processed);
        }
        processed
    }
}

/// Apply each rule as a global substitution over the output of the previous
/// one. Rules that do not compile are skipped.
pub fn apply_filters(rules: &[FilterRule], text: &str) -> String {
    let mut modified = text.to_string();

    for rule in rules {
        let re = match Regex::new(&rule.pattern) {
            Ok(re) => re,
            Err(e) => {
                warn!("Skipping filter pattern '{}': {}", rule.pattern, e);
                continue;
            }
        };

        let expansion = to_expansion(&rule.replacement);
        let replaced = re.replace_all(&modified, expansion.as_str());
        if replaced != modified {
            debug!(
                "Filter '{}' changed text: '{}' -> '{}'",
                rule.pattern, modified, replaced
            );
            modified = replaced.into_owned();
        }
    }

    modified
}

/// Translate a stored replacement into the regex crate's expansion syntax.
///
/// Stored rules use backslash group references (`\1`, `\g<name>`, `\g<2>`)
/// and treat `$` as a literal character. Groups become `${..}` so a following
/// letter or digit is never read as part of the group name.
pub fn to_expansion(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.next() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = d.to_string();
                    if let Some(next) = chars.next_if(char::is_ascii_digit) {
                        group.push(next);
                    }
                    push_group(&mut out, &group);
                }
                Some('g') if chars.peek() == Some(&'<') => {
                    chars.next();
                    let name: String = chars.by_ref().take_while(|&c| c != '>').collect();
                    push_group(&mut out, &name);
                }
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some('$') => out.push_str("\\$$"),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            c => out.push(c),
        }
    }
    out
}

fn push_group(out: &mut String, name: &str) {
    out.push_str("${");
    out.push_str(name);
    out.push('}');
}
