//! Durable key-value storage of subscriber state.
//!
//! The store writes through on every mutation: each call to
//! [`StatePersistence::save`] replaces one subscriber's item list. An empty
//! list deletes the subscriber's entry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pricewatch_core::{ChatId, TrackedItems};
use tokio::sync::Mutex;

use crate::error::StoreError;

/// Full persisted state: subscriber → tracked items.
pub type SubscriberState = BTreeMap<ChatId, TrackedItems>;

#[async_trait]
pub trait StatePersistence: Send + Sync {
    /// Loads every persisted subscriber. A store that has never been
    /// written loads as empty.
    async fn load(&self) -> Result<SubscriberState, StoreError>;

    /// Replaces the persisted items of `chat_id`.
    async fn save(&self, chat_id: ChatId, items: &TrackedItems) -> Result<(), StoreError>;
}

/// JSON file persistence.
///
/// The file holds a single object keyed by chat id:
///
/// ```json
/// { "42": [ { "url": "...", "target_price": "500.00", "initial_price": "649.00", "added_at": "..." } ] }
/// ```
///
/// Prices are decimal strings so values reload with their exact scale.
/// Each save rewrites the whole file through a temporary sibling and a rename.
pub struct JsonFilePersistence {
    path: PathBuf,
    state: Mutex<SubscriberState>,
}

impl JsonFilePersistence {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(SubscriberState::new()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn write_atomically(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }
}

#[async_trait]
impl StatePersistence for JsonFilePersistence {
    async fn load(&self) -> Result<SubscriberState, StoreError> {
        let loaded = match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => SubscriberState::new(),
            Ok(bytes) => serde_json::from_slice::<SubscriberState>(&bytes).map_err(|source| {
                StoreError::Deserialize {
                    path: self.path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no state file yet; starting empty");
                SubscriberState::new()
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let mut state = self.state.lock().await;
        state.clone_from(&loaded);
        Ok(loaded)
    }

    async fn save(&self, chat_id: ChatId, items: &TrackedItems) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        let mut next = state.clone();
        if items.is_empty() {
            next.remove(&chat_id);
        } else {
            next.insert(chat_id, items.clone());
        }

        let bytes = serde_json::to_vec_pretty(&next).map_err(StoreError::Serialize)?;
        self.write_atomically(&bytes).await?;
        *state = next;

        tracing::debug!(
            path = %self.path.display(),
            chat_id = %chat_id,
            items = items.len(),
            "state saved"
        );
        Ok(())
    }
}

/// In-memory persistence, for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryPersistence {
    state: std::sync::Mutex<SubscriberState>,
    saves: std::sync::atomic::AtomicUsize,
    fail_saves: std::sync::atomic::AtomicBool,
}

impl MemoryPersistence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_state(state: SubscriberState) -> Self {
        Self {
            state: std::sync::Mutex::new(state),
            ..Self::default()
        }
    }

    /// Copy of what is currently persisted.
    #[must_use]
    pub fn snapshot(&self) -> SubscriberState {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of successful saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Makes every subsequent save fail with an I/O error.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl StatePersistence for MemoryPersistence {
    async fn load(&self) -> Result<SubscriberState, StoreError> {
        Ok(self.snapshot())
    }

    async fn save(&self, chat_id: ChatId, items: &TrackedItems) -> Result<(), StoreError> {
        if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::other("save disabled"),
            });
        }

        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if items.is_empty() {
            state.remove(&chat_id);
        } else {
            state.insert(chat_id, items.clone());
        }
        self.saves.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
