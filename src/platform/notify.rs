use tracing::warn;

use crate::config::NotifyMode;
use crate::platform::{ChatApi, InboundEvent};

/// Reaction put on a message whose link is being converted.
pub const ACK_EMOJI: &str = "👌";

fn heads_up(url: &str) -> String {
    format!("Found a .webm link: {}\nWill try to turn it into an .mp4", url)
}

/// Let the chat know `url` was picked up.
///
/// Advisory only: a failure is logged and otherwise ignored.
pub async fn notify(chat: &dyn ChatApi, event: &InboundEvent, url: &str, mode: NotifyMode) {
    let result = match mode {
        NotifyMode::Reaction => {
            chat.add_reaction(&event.chat_id, &event.message_id, ACK_EMOJI)
                .await
        }
        NotifyMode::Message => chat.send_text(&event.chat_id, &heads_up(url)).await,
    };

    if let Err(e) = result {
        warn!("Failed to send {} notification for {}: {:#}", mode, url, e);
    }
}
