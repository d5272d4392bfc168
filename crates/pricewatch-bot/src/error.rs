use pricewatch_core::ChatId;
use pricewatch_scraper::ScraperError;
use pricewatch_store::StoreError;
use thiserror::Error;

use crate::messages;

/// Failures of a chat command. None of them change tracking state.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid command input: {reason}")]
    InvalidInput {
        reason: String,
        usage: &'static str,
    },

    #[error("chat {chat_id} already tracks {url}")]
    AlreadyTracked { chat_id: ChatId, url: String },

    #[error("chat {chat_id} does not track {url}")]
    NotTracked { chat_id: ChatId, url: String },

    #[error("initial price check for {url} (chat {chat_id}) failed: {source}")]
    Fetch {
        chat_id: ChatId,
        url: String,
        #[source]
        source: ScraperError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CommandError {
    /// Text sent back to the user.
    #[must_use]
    pub fn reply(&self) -> String {
        match self {
            CommandError::InvalidInput { usage, .. } => messages::invalid_format(usage),
            CommandError::AlreadyTracked { .. } => messages::already_tracking(),
            CommandError::NotTracked { .. } => messages::not_tracking(),
            CommandError::Fetch { source, .. } => messages::tracking_setup_failed(source),
            CommandError::Store(_) => messages::storage_failed(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification endpoint returned HTTP {status}")]
    UnexpectedStatus { status: u16 },

    #[error("console write failed: {0}")]
    Io(#[from] std::io::Error),
}
