//! The price check run on every job tick.
//!
//! A tick snapshots the subscriber's items and fetches each price in turn
//! without holding the subscriber lock. It then relocks, alerts on hits for
//! items that are still tracked unchanged, and prunes every satisfied or
//! failed item with a single store write. Items added while the tick is
//! fetching are left for the next tick. Fetch failures of any kind untrack
//! the item; nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pricewatch_core::{ChatId, Decimal, TrackedItem};
use pricewatch_scraper::{PriceFetcher, ScraperError};
use pricewatch_store::TrackingStore;

use crate::messages;
use crate::notify::Notifier;
use crate::scheduler::{JobScheduler, TickHandler};

/// Summary of one tick, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub checked: usize,
    pub hits: Vec<String>,
    pub failures: Vec<String>,
    /// URLs actually removed from the store.
    pub removed: Vec<String>,
    pub job_cancelled: bool,
}

enum ItemOutcome {
    Hit(Decimal),
    Above,
    Failed(ScraperError),
}

pub struct PriceCheckWorker {
    store: Arc<TrackingStore>,
    fetcher: Arc<dyn PriceFetcher>,
    notifier: Arc<dyn Notifier>,
    fetch_timeout: Duration,
    currency_symbol: String,
}

impl PriceCheckWorker {
    #[must_use]
    pub fn new(
        store: Arc<TrackingStore>,
        fetcher: Arc<dyn PriceFetcher>,
        notifier: Arc<dyn Notifier>,
        fetch_timeout: Duration,
        currency_symbol: impl Into<String>,
    ) -> Self {
        Self {
            store,
            fetcher,
            notifier,
            fetch_timeout,
            currency_symbol: currency_symbol.into(),
        }
    }

    /// Runs one price check for `chat_id`.
    ///
    /// Cancels the subscriber's job when it has no items or every item was
    /// pruned by this tick.
    pub async fn check_subscriber(&self, chat_id: ChatId, scheduler: &JobScheduler) -> TickReport {
        let mut report = TickReport::default();

        // Cancel only while holding the guard, even when there is no record.
        let snapshot = {
            let guard = self.store.lock(chat_id).await;
            if guard.is_empty() {
                tracing::info!(chat_id = %chat_id, "no items to track; stopping job");
                report.job_cancelled = scheduler.cancel(chat_id);
                return report;
            }
            guard.snapshot()
        };

        tracing::info!(chat_id = %chat_id, items = snapshot.len(), "running scheduled price check");

        // Fetch without holding the lock; commands stay responsive meanwhile.
        let mut outcomes: Vec<(&TrackedItem, ItemOutcome)> = Vec::new();
        for item in &snapshot {
            report.checked += 1;
            match self.check_item(chat_id, item).await {
                ItemOutcome::Above => {}
                outcome => outcomes.push((item, outcome)),
            }
        }

        if outcomes.is_empty() {
            return report;
        }

        let mut guard = self.store.lock(chat_id).await;

        // Only act on items the subscriber still tracks unchanged. An item
        // untracked or re-tracked during the fetch is not alerted or pruned.
        let mut to_remove: Vec<TrackedItem> = Vec::new();
        for (item, outcome) in outcomes {
            if guard.items().get(&item.url) != Some(item) {
                tracing::debug!(chat_id = %chat_id, url = %item.url, "item changed during check; skipping");
                continue;
            }
            match outcome {
                ItemOutcome::Hit(current) => {
                    let text = messages::price_alert(
                        &item.url,
                        current,
                        item.target_price,
                        &self.currency_symbol,
                    );
                    match self.notifier.send(chat_id, &text).await {
                        Ok(()) => {
                            report.hits.push(item.url.clone());
                            to_remove.push(item.clone());
                        }
                        Err(e) => {
                            // Keep the item so the alert is retried next tick.
                            tracing::error!(
                                chat_id = %chat_id,
                                url = %item.url,
                                error = %e,
                                "failed to deliver price alert"
                            );
                        }
                    }
                }
                ItemOutcome::Above => {}
                ItemOutcome::Failed(err) => {
                    tracing::error!(
                        chat_id = %chat_id,
                        url = %item.url,
                        kind = %err.kind(),
                        error = %err,
                        "failed to check price"
                    );
                    if let Err(e) = self
                        .notifier
                        .send(chat_id, &messages::check_failed(&item.url))
                        .await
                    {
                        tracing::warn!(chat_id = %chat_id, error = %e, "failed to deliver failure notice");
                    }
                    report.failures.push(item.url.clone());
                    to_remove.push(item.clone());
                }
            }
        }

        match guard.remove_all(&to_remove).await {
            Ok(removed) => {
                for item in &removed {
                    tracing::info!(chat_id = %chat_id, url = %item.url, "removed from tracking");
                }
                report.removed = removed.into_iter().map(|item| item.url).collect();
            }
            Err(e) => {
                tracing::error!(chat_id = %chat_id, error = %e, "failed to prune tracked items");
            }
        }

        if guard.is_empty() {
            tracing::info!(chat_id = %chat_id, "no items left; stopping job");
            report.job_cancelled = scheduler.cancel(chat_id);
        }
        report
    }

    async fn check_item(&self, chat_id: ChatId, item: &TrackedItem) -> ItemOutcome {
        let fetched =
            tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch_price(&item.url)).await;

        let current = match fetched {
            Ok(Ok(price)) => price,
            Ok(Err(err)) => return ItemOutcome::Failed(err),
            Err(_elapsed) => {
                return ItemOutcome::Failed(ScraperError::Timeout {
                    url: item.url.clone(),
                    secs: self.fetch_timeout.as_secs(),
                })
            }
        };

        tracing::info!(
            chat_id = %chat_id,
            url = %item.url,
            current = %current,
            target = %item.target_price,
            "checked price"
        );

        if item.is_hit(current) {
            ItemOutcome::Hit(current)
        } else {
            ItemOutcome::Above
        }
    }
}

#[async_trait]
impl TickHandler for PriceCheckWorker {
    async fn on_tick(&self, chat_id: ChatId, scheduler: &JobScheduler) {
        let report = self.check_subscriber(chat_id, scheduler).await;
        tracing::info!(
            chat_id = %chat_id,
            checked = report.checked,
            hits = report.hits.len(),
            failures = report.failures.len(),
            removed = report.removed.len(),
            job_cancelled = report.job_cancelled,
            "price check complete"
        );
    }
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod tests;
