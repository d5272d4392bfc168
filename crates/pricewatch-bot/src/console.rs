//! Line-oriented chat transport over stdin/stdout.
//!
//! Each input line is `[<chat_id>] <message>`; without a leading numeric id
//! the message is attributed to the default chat. Replies are written as
//! `[chat <id>] <reply>`, the same shape [`crate::ConsoleNotifier`] uses for
//! alerts.

use pricewatch_core::ChatId;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::service::PriceWatch;

/// Splits an optional leading chat id off an input line.
#[must_use]
pub fn split_chat_id(line: &str, default_chat_id: ChatId) -> (ChatId, &str) {
    let line = line.trim();
    if let Some((head, rest)) = line.split_once(char::is_whitespace) {
        if let Ok(chat_id) = head.parse::<ChatId>() {
            return (chat_id, rest.trim_start());
        }
    } else if let Ok(chat_id) = line.parse::<ChatId>() {
        return (chat_id, "");
    }
    (default_chat_id, line)
}

/// Serves chat input from `reader` until EOF.
///
/// # Errors
///
/// Returns any I/O error from reading input or writing replies.
pub async fn run_console<R, W>(
    watch: &PriceWatch,
    reader: R,
    mut writer: W,
    default_chat_id: ChatId,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let (chat_id, text) = split_chat_id(&line, default_chat_id);
        if text.is_empty() {
            continue;
        }

        tracing::debug!(chat_id = %chat_id, text, "console input");
        if let Some(reply) = watch.handle_message(chat_id, text).await {
            writer
                .write_all(format!("[chat {chat_id}] {reply}\n").as_bytes())
                .await?;
            writer.flush().await?;
        }
    }
    tracing::info!("console input closed");
    Ok(())
}
