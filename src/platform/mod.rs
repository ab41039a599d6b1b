pub mod telegram;

/// A channel post received from any platform
#[derive(Debug, Clone, Default)]
pub struct IncomingPost {
    /// Platform-specific numeric chat id
    pub chat_id: i64,
    /// Public handle of the chat, without "@"
    pub username: Option<String>,
    pub message_id: i32,
    pub text: Option<String>,
    /// Caption of a media post
    pub caption: Option<String>,
}
