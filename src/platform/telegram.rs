use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ReactionType};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::platform::{BotIdentity, ChatApi, InboundEvent};

fn parse_chat_id(chat_id: &str) -> Result<ChatId> {
    chat_id
        .parse()
        .map(ChatId)
        .with_context(|| format!("Invalid Telegram chat id: {}", chat_id))
}

fn parse_message_id(message_id: &str) -> Result<MessageId> {
    message_id
        .parse()
        .map(MessageId)
        .with_context(|| format!("Invalid Telegram message id: {}", message_id))
}

/// [`ChatApi`] backed by the Telegram Bot API.
pub struct TelegramChat {
    bot: Bot,
}

impl TelegramChat {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatApi for TelegramChat {
    async fn add_reaction(&self, chat_id: &str, message_id: &str, emoji: &str) -> Result<()> {
        self.bot
            .set_message_reaction(parse_chat_id(chat_id)?, parse_message_id(message_id)?)
            .reaction(vec![ReactionType::Emoji {
                emoji: emoji.to_string(),
            }])
            .await
            .context("Telegram setMessageReaction failed")?;
        Ok(())
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        self.bot
            .send_message(parse_chat_id(chat_id)?, text)
            .await
            .context("Telegram sendMessage failed")?;
        Ok(())
    }

    async fn upload_file(
        &self,
        chat_id: &str,
        file: tokio::fs::File,
        filename: &str,
    ) -> Result<()> {
        let video = InputFile::read(file).file_name(filename.to_string());
        self.bot
            .send_video(parse_chat_id(chat_id)?, video)
            .supports_streaming(true)
            .await
            .context("Telegram sendVideo failed")?;
        Ok(())
    }
}

/// Ask Telegram who we are. Failure here is fatal for the process.
pub async fn identify(bot: &Bot) -> Result<BotIdentity> {
    let me = bot
        .get_me()
        .await
        .context("Could not complete getMe handshake with Telegram")?;

    info!(
        "Connected as @{} ({})",
        me.user.username.as_deref().unwrap_or("unknown"),
        me.user.id.0
    );
    Ok(BotIdentity::new(me.user.id.0.to_string()))
}

/// Text to scan: the message body, or the caption of a media message.
fn inbound_event(msg: &Message) -> Option<InboundEvent> {
    let text = msg.text().or_else(|| msg.caption())?;
    Some(InboundEvent {
        chat_id: msg.chat.id.0.to_string(),
        message_id: msg.id.0.to_string(),
        sender_id: msg.from.as_ref().map(|user| user.id.0.to_string()),
        text: text.to_string(),
    })
}

/// Receive updates until shutdown, forwarding messages into `events`.
///
/// Returns on Ctrl-C. `events` is dropped on return, which closes the stream
/// for whoever consumes it.
pub async fn run(bot: Bot, events: mpsc::UnboundedSender<InboundEvent>) -> Result<()> {
    info!("Starting Telegram event loop...");

    let handler = Update::filter_message()
        .filter_map(|msg: Message| inbound_event(&msg))
        .endpoint(forward_event);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![events])
        .default_handler(|upd| async move {
            debug!("Ignoring update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Telegram event loop stopped");
    Ok(())
}

async fn forward_event(
    event: InboundEvent,
    events: mpsc::UnboundedSender<InboundEvent>,
) -> ResponseResult<()> {
    debug!("Message {} in chat {}", event.message_id, event.chat_id);
    if events.send(event).is_err() {
        warn!("Dispatcher is gone, dropping message");
    }
    Ok(())
}
