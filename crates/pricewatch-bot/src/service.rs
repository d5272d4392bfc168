//! Command handling.
//!
//! [`PriceWatch`] is the single entry point for chat input. Every command
//! that changes a subscriber's items also starts or cancels that
//! subscriber's job while still holding the subscriber's lock, so the
//! job table never disagrees with the store.

use std::sync::Arc;
use std::time::Duration;

use pricewatch_core::{normalize_product_url, ChatId, Decimal, TrackedItem};
use pricewatch_scraper::{PriceFetcher, ScraperError};
use pricewatch_store::TrackingStore;

use crate::commands::Command;
use crate::error::CommandError;
use crate::messages;
use crate::scheduler::{JobScheduler, MAX_JOB_DELAY};

pub struct PriceWatch {
    store: Arc<TrackingStore>,
    scheduler: JobScheduler,
    fetcher: Arc<dyn PriceFetcher>,
    fetch_timeout: Duration,
    currency_symbol: String,
}

impl PriceWatch {
    #[must_use]
    pub fn new(
        store: Arc<TrackingStore>,
        scheduler: JobScheduler,
        fetcher: Arc<dyn PriceFetcher>,
        fetch_timeout: Duration,
        currency_symbol: impl Into<String>,
    ) -> Self {
        Self {
            store,
            scheduler,
            fetcher,
            fetch_timeout,
            currency_symbol: currency_symbol.into(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<TrackingStore> {
        &self.store
    }

    #[must_use]
    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    /// Handles one line of chat input and returns the reply, if any.
    ///
    /// Text that is not a command gets no reply. Command errors are turned
    /// into their user-facing reply here.
    pub async fn handle_message(&self, chat_id: ChatId, text: &str) -> Option<String> {
        let command = match Command::parse(text) {
            Ok(Some(command)) => command,
            Ok(None) => return None,
            Err(e) => {
                tracing::info!(chat_id = %chat_id, error = %e, "rejected command");
                return Some(e.reply());
            }
        };

        match self.execute(chat_id, command).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                match &e {
                    CommandError::Fetch { .. } | CommandError::Store(_) => {
                        tracing::error!(chat_id = %chat_id, error = %e, "command failed");
                    }
                    _ => tracing::info!(chat_id = %chat_id, error = %e, "command rejected"),
                }
                Some(e.reply())
            }
        }
    }

    /// Runs a parsed command and renders the success reply.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] when the command cannot be carried out;
    /// tracking state is then unchanged.
    pub async fn execute(&self, chat_id: ChatId, command: Command) -> Result<String, CommandError> {
        match command {
            Command::Start | Command::Help => Ok(messages::welcome()),
            Command::Track { url, target } => {
                let item = self.track(chat_id, url, target).await?;
                Ok(messages::tracking_started(&item, &self.currency_symbol))
            }
            Command::List => {
                let items = self.list(chat_id).await;
                Ok(messages::tracked_list(&items, &self.currency_symbol))
            }
            Command::Untrack { url } => {
                let url = self.untrack(chat_id, &url).await?;
                Ok(messages::stopped_tracking(&url))
            }
            Command::Unknown(name) => Ok(messages::unknown_command(&name)),
        }
    }

    /// Tracks an already-normalized `url` at `target`.
    ///
    /// The current price is fetched first and becomes the item's initial
    /// price. The subscriber's job is started if this is its first item.
    ///
    /// # Errors
    ///
    /// - [`CommandError::AlreadyTracked`] if the URL is tracked already
    /// - [`CommandError::Fetch`] if the initial price cannot be fetched
    /// - [`CommandError::Store`] if the new item cannot be persisted
    pub async fn track(
        &self,
        chat_id: ChatId,
        url: String,
        target: Decimal,
    ) -> Result<TrackedItem, CommandError> {
        let already = match self.store.lock_existing(chat_id).await {
            Some(guard) => guard.contains(&url),
            None => false,
        };
        if already {
            return Err(CommandError::AlreadyTracked { chat_id, url });
        }

        // No lock is held across the fetch; the insert below rechecks.
        let initial = self
            .fetch_initial_price(&url)
            .await
            .map_err(|source| CommandError::Fetch {
                chat_id,
                url: url.clone(),
                source,
            })?;

        let item = TrackedItem::new(url, target, initial);
        let mut guard = self.store.lock(chat_id).await;
        if !guard.add(item.clone()).await? {
            return Err(CommandError::AlreadyTracked {
                chat_id,
                url: item.url,
            });
        }
        self.scheduler.ensure_started(chat_id);

        tracing::info!(
            chat_id = %chat_id,
            url = %item.url,
            target = %item.target_price,
            initial = %item.initial_price,
            "tracking started"
        );
        Ok(item)
    }

    /// Stops tracking `raw_url` (normalized before lookup) and returns the
    /// normalized URL. Removing the last item cancels the job.
    ///
    /// # Errors
    ///
    /// - [`CommandError::NotTracked`] if the URL is not tracked (or not a URL)
    /// - [`CommandError::Store`] if the removal cannot be persisted
    pub async fn untrack(&self, chat_id: ChatId, raw_url: &str) -> Result<String, CommandError> {
        let not_tracked = |url: &str| CommandError::NotTracked {
            chat_id,
            url: url.to_string(),
        };

        let url = normalize_product_url(raw_url).map_err(|_| not_tracked(raw_url.trim()))?;
        let Some(mut guard) = self.store.lock_existing(chat_id).await else {
            return Err(not_tracked(&url));
        };
        if guard.remove(&url).await?.is_none() {
            return Err(not_tracked(&url));
        }
        if guard.is_empty() {
            self.scheduler.cancel(chat_id);
        }

        tracing::info!(chat_id = %chat_id, url = %url, "tracking stopped");
        Ok(url)
    }

    /// Items tracked by `chat_id`, in insertion order.
    pub async fn list(&self, chat_id: ChatId) -> Vec<TrackedItem> {
        self.store.list(chat_id).await
    }

    /// Starts a job for every subscriber loaded with tracked items.
    ///
    /// Each job's first tick is delayed by `first_delay` plus a random share
    /// of `jitter`, so a restart does not fire every check at once. Returns
    /// the number of jobs started.
    pub async fn restore_jobs(&self, first_delay: Duration, jitter: Duration) -> usize {
        let mut started = 0;
        for chat_id in self.store.subscribers() {
            let Some(guard) = self.store.lock_existing(chat_id).await else {
                continue;
            };
            if guard.is_empty() {
                continue;
            }
            let spread = jitter.min(MAX_JOB_DELAY).mul_f64(rand::random::<f64>());
            let delay = first_delay.saturating_add(spread);
            if self.scheduler.ensure_started_with_delay(chat_id, delay) {
                started += 1;
            }
        }
        tracing::info!(jobs = started, "restored price-check jobs");
        started
    }

    async fn fetch_initial_price(&self, url: &str) -> Result<Decimal, ScraperError> {
        match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch_price(url)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(ScraperError::Timeout {
                url: url.to_string(),
                secs: self.fetch_timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "service_test.rs"]
mod tests;
