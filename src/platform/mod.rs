pub mod notify;
pub mod publish;
pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

/// A chat message as the pipeline sees it, independent of the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Platform-specific chat/channel ID as string
    pub chat_id: String,
    /// ID of the message itself, used to target reactions
    pub message_id: String,
    /// Author of the message, if the platform reports one
    pub sender_id: Option<String>,
    /// Message text (or media caption)
    pub text: String,
}

/// The bot's own sender ID, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity(String);

impl BotIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `event` was written by this bot.
    pub fn authored(&self, event: &InboundEvent) -> bool {
        event.sender_id.as_deref() == Some(self.as_str())
    }
}

/// The outbound half of a chat platform.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn add_reaction(&self, chat_id: &str, message_id: &str, emoji: &str) -> Result<()>;

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()>;

    /// Upload the contents of `file` to the chat under the name `filename`.
    async fn upload_file(&self, chat_id: &str, file: tokio::fs::File, filename: &str)
        -> Result<()>;
}
