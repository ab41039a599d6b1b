use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info, warn};

/// Which part of the post is being rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostField {
    Text,
    Caption,
}

impl PostField {
    fn label(self) -> &'static str {
        match self {
            PostField::Text => "text",
            PostField::Caption => "caption",
        }
    }

    /// Body of the reply sent when the post cannot be edited
    pub fn reply_text(self, corrected: &str) -> String {
        match self {
            PostField::Text => format!("Message text should be:\n\n{}", corrected),
            PostField::Caption => format!("Caption should be:\n\n{}", corrected),
        }
    }
}

/// Edit strategies, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAttempt {
    /// Edit in place, keeping the post's formatting entities
    Direct,
    /// Edit in place without entities, whose offsets may no longer fit the
    /// rewritten text
    Plain,
}

const ATTEMPTS: [EditAttempt; 2] = [EditAttempt::Direct, EditAttempt::Plain];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Edited,
    EditedViaFallback,
    RepliedInstead,
    Failed,
}

/// The chat-platform side of an edit, bound to one post
#[async_trait]
pub trait PostEditor: Send + Sync {
    async fn edit(&self, attempt: EditAttempt, field: PostField, text: &str) -> Result<()>;
    async fn reply(&self, text: &str) -> Result<()>;
}

/// Try each edit strategy once, stopping at the first success; otherwise
/// optionally reply with the corrected text. Never retries.
pub async fn apply_edit<E>(
    editor: &E,
    field: PostField,
    text: &str,
    reply_on_failure: bool,
) -> EditOutcome
where
    E: PostEditor + ?Sized,
{
    for (i, attempt) in ATTEMPTS.iter().enumerate() {
        match editor.edit(*attempt, field, text).await {
            Ok(()) => {
                info!("Edited {} ({:?})", field.label(), attempt);
                return if i == 0 {
                    EditOutcome::Edited
                } else {
                    EditOutcome::EditedViaFallback
                };
            }
            Err(e) if i + 1 < ATTEMPTS.len() => {
                warn!("Could not edit {} ({:?}): {:#}", field.label(), attempt, e);
            }
            Err(e) => {
                error!("Failed to edit {} ({:?}): {:#}", field.label(), attempt, e);
            }
        }
    }

    if !reply_on_failure {
        return EditOutcome::Failed;
    }

    match editor.reply(&field.reply_text(text)).await {
        Ok(()) => {
            info!("Sent reply with corrected {}", field.label());
            EditOutcome::RepliedInstead
        }
        Err(e) => {
            error!("Failed to send reply: {:#}", e);
            EditOutcome::Failed
        }
    }
}
