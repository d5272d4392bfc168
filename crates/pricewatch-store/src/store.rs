//! Shared, lock-guarded subscriber state.
//!
//! Each subscriber's [`TrackedItems`] sits behind its own async mutex, so
//! command handlers and tick handlers for different subscribers never
//! contend. Every mutation is applied to a copy, persisted, and only then
//! committed in memory: a failed save leaves both copies unchanged.
//! A subscriber's record is released once its last item is gone.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};

use pricewatch_core::{ChatId, TrackedItem, TrackedItems};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::StoreError;
use crate::persistence::StatePersistence;

type Slot = Arc<Mutex<TrackedItems>>;

pub struct TrackingStore {
    subscribers: std::sync::Mutex<HashMap<ChatId, Slot>>,
    persistence: Arc<dyn StatePersistence>,
}

impl TrackingStore {
    /// Loads persisted state and returns a store over it.
    ///
    /// # Errors
    ///
    /// Propagates any [`StoreError`] from [`StatePersistence::load`].
    pub async fn open(persistence: Arc<dyn StatePersistence>) -> Result<Self, StoreError> {
        let loaded = persistence.load().await?;
        tracing::info!(subscribers = loaded.len(), "subscriber state loaded");

        let subscribers = loaded
            .into_iter()
            .map(|(chat_id, items)| (chat_id, Arc::new(Mutex::new(items))))
            .collect();

        Ok(Self {
            subscribers: std::sync::Mutex::new(subscribers),
            persistence,
        })
    }

    /// Subscribers that currently have a record, in id order.
    #[must_use]
    pub fn subscribers(&self) -> Vec<ChatId> {
        let mut ids: Vec<ChatId> = self.slots().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Locks `chat_id`'s items, creating an empty record if none exists.
    ///
    /// The guard serializes every read-then-write sequence for that
    /// subscriber until it is dropped. A record left empty when its guard
    /// drops is released.
    pub async fn lock(&self, chat_id: ChatId) -> SubscriberGuard<'_> {
        loop {
            let slot = Arc::clone(self.slots().entry(chat_id).or_default());
            if let Some(guard) = self.guard(chat_id, slot).await {
                return guard;
            }
        }
    }

    /// Locks `chat_id`'s items only if the subscriber has a record.
    pub async fn lock_existing(&self, chat_id: ChatId) -> Option<SubscriberGuard<'_>> {
        loop {
            let slot = self.slots().get(&chat_id).map(Arc::clone)?;
            if let Some(guard) = self.guard(chat_id, slot).await {
                return Some(guard);
            }
        }
    }

    /// Tracks `item` for `chat_id`.
    ///
    /// Returns `false` without touching state when the URL is already tracked.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the new state cannot be persisted; the item
    /// is then not tracked.
    pub async fn add(&self, chat_id: ChatId, item: TrackedItem) -> Result<bool, StoreError> {
        self.lock(chat_id).await.add(item).await
    }

    /// Stops tracking `url` for `chat_id`. Returns `false` if it was not tracked.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the new state cannot be persisted; the item
    /// then stays tracked.
    pub async fn remove(&self, chat_id: ChatId, url: &str) -> Result<bool, StoreError> {
        let Some(mut guard) = self.lock_existing(chat_id).await else {
            return Ok(false);
        };
        Ok(guard.remove(url).await?.is_some())
    }

    /// Ordered snapshot of `chat_id`'s items.
    pub async fn list(&self, chat_id: ChatId) -> Vec<TrackedItem> {
        match self.lock_existing(chat_id).await {
            Some(guard) => guard.items().iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub async fn is_empty(&self, chat_id: ChatId) -> bool {
        match self.lock_existing(chat_id).await {
            Some(guard) => guard.is_empty(),
            None => true,
        }
    }

    /// Locks `slot`, or returns `None` if it was released while waiting.
    async fn guard(&self, chat_id: ChatId, slot: Slot) -> Option<SubscriberGuard<'_>> {
        let items = Arc::clone(&slot).lock_owned().await;
        let live = self
            .slots()
            .get(&chat_id)
            .is_some_and(|current| Arc::ptr_eq(current, &slot));
        live.then(|| SubscriberGuard {
            chat_id,
            store: self,
            slot,
            items,
        })
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<ChatId, Slot>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive access to one subscriber's items.
pub struct SubscriberGuard<'a> {
    chat_id: ChatId,
    store: &'a TrackingStore,
    slot: Slot,
    items: OwnedMutexGuard<TrackedItems>,
}

impl SubscriberGuard<'_> {
    #[must_use]
    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    #[must_use]
    pub fn items(&self) -> &TrackedItems {
        &self.items
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.items.contains(url)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Owned copy of the items, safe to iterate after the guard is dropped.
    #[must_use]
    pub fn snapshot(&self) -> TrackedItems {
        (*self.items).clone()
    }

    /// See [`TrackingStore::add`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the new state cannot be persisted.
    pub async fn add(&mut self, item: TrackedItem) -> Result<bool, StoreError> {
        let mut next = self.snapshot();
        if !next.insert(item) {
            return Ok(false);
        }
        self.commit(next).await?;
        Ok(true)
    }

    /// See [`TrackingStore::remove`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the new state cannot be persisted.
    pub async fn remove(&mut self, url: &str) -> Result<Option<TrackedItem>, StoreError> {
        let mut next = self.snapshot();
        let Some(removed) = next.remove(url) else {
            return Ok(None);
        };
        self.commit(next).await?;
        Ok(Some(removed))
    }

    /// Removes every item in `items` that is still tracked unchanged, with a
    /// single save.
    ///
    /// An item is skipped when its URL is no longer tracked or now maps to a
    /// different entry (untracked and re-tracked concurrently). Returns the
    /// removed items.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the new state cannot be persisted; nothing
    /// is removed in that case.
    pub async fn remove_all<'i, I>(&mut self, items: I) -> Result<Vec<TrackedItem>, StoreError>
    where
        I: IntoIterator<Item = &'i TrackedItem>,
    {
        let mut next = self.snapshot();
        let mut removed = Vec::new();
        for item in items {
            if next.get(&item.url) == Some(item) {
                removed.extend(next.remove(&item.url));
            }
        }

        if !removed.is_empty() {
            self.commit(next).await?;
        }
        Ok(removed)
    }

    async fn commit(&mut self, next: TrackedItems) -> Result<(), StoreError> {
        self.store.persistence.save(self.chat_id, &next).await?;
        *self.items = next;
        Ok(())
    }
}

impl Drop for SubscriberGuard<'_> {
    fn drop(&mut self) {
        if !self.items.is_empty() {
            return;
        }
        // Still holding the item lock here, so no one can refill this slot.
        // Waiters already queued on it see it is gone and retry.
        let mut slots = self.store.slots();
        if slots
            .get(&self.chat_id)
            .is_some_and(|current| Arc::ptr_eq(current, &self.slot))
        {
            slots.remove(&self.chat_id);
        }
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
