//! Outbound alert delivery.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pricewatch_core::ChatId;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::NotifyError;

/// Delivers a text message to a subscriber.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), NotifyError>;
}

/// Writes messages to stdout, one `[chat <id>]`-prefixed block per message.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), NotifyError> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("[chat {chat_id}] {text}\n").as_bytes())
            .await?;
        stdout.flush().await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    chat_id: ChatId,
    text: &'a str,
}

/// POSTs `{"chat_id": <id>, "text": "<message>"}` to a fixed URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// # Errors
    ///
    /// Returns [`NotifyError::Http`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { chat_id, text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Sends every message to each inner notifier.
///
/// All notifiers are attempted; the first error (if any) is returned.
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    #[must_use]
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), NotifyError> {
        let mut first_err = None;
        for notifier in &self.notifiers {
            if let Err(e) = notifier.send(chat_id, text).await {
                tracing::warn!(chat_id = %chat_id, error = %e, "notifier failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub text: String,
}

/// Notifier that keeps every message in memory, for tests.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    failing: Arc<std::sync::atomic::AtomicBool>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Messages delivered to `chat_id`.
    #[must_use]
    pub fn sent_to(&self, chat_id: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|m| m.chat_id == chat_id)
            .map(|m| m.text)
            .collect()
    }

    /// While set, every send fails and nothing is recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), NotifyError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(NotifyError::Io(std::io::Error::other("notifier offline")));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentMessage {
                chat_id,
                text: text.to_string(),
            });
        Ok(())
    }
}
