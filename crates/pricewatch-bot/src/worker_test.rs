use std::str::FromStr;

use pricewatch_core::TrackedItems;
use pricewatch_scraper::{FailureKind, FakeFetcher, FakeOutcome};
use pricewatch_store::{MemoryPersistence, StatePersistence};

use super::*;
use crate::notify::RecordingNotifier;

const CHAT: ChatId = ChatId(42);

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

struct Harness {
    store: Arc<TrackingStore>,
    persistence: Arc<MemoryPersistence>,
    fetcher: FakeFetcher,
    notifier: RecordingNotifier,
    worker: Arc<PriceCheckWorker>,
    scheduler: JobScheduler,
}

impl Harness {
    async fn new() -> Self {
        let persistence = Arc::new(MemoryPersistence::new());
        let store = Arc::new(
            TrackingStore::open(Arc::clone(&persistence) as Arc<dyn StatePersistence>)
                .await
                .unwrap(),
        );
        let fetcher = FakeFetcher::new();
        let notifier = RecordingNotifier::new();
        let worker = Arc::new(PriceCheckWorker::new(
            Arc::clone(&store),
            Arc::new(fetcher.clone()),
            Arc::new(notifier.clone()),
            Duration::from_secs(20),
            "₹",
        ));
        // Jobs are started so cancellation is observable, but never fire
        // during a test: ticks are driven by calling the worker directly.
        let day = Duration::from_secs(86_400);
        let scheduler = JobScheduler::new(
            Arc::clone(&worker) as Arc<dyn TickHandler>,
            day,
            day,
        );
        Self {
            store,
            persistence,
            fetcher,
            notifier,
            worker,
            scheduler,
        }
    }

    async fn track(&self, url: &str, target: &str, initial: &str) {
        let item = TrackedItem::new(url.to_string(), dec(target), dec(initial));
        assert!(self.store.add(CHAT, item).await.unwrap());
        self.scheduler.ensure_started(CHAT);
    }

    async fn tick(&self) -> TickReport {
        self.worker.check_subscriber(CHAT, &self.scheduler).await
    }

    async fn urls(&self) -> Vec<String> {
        self.store
            .list(CHAT)
            .await
            .into_iter()
            .map(|item| item.url)
            .collect()
    }

    /// A job exists iff the subscriber tracks something.
    async fn assert_job_invariant(&self) {
        assert_eq!(
            self.scheduler.is_active(CHAT),
            !self.store.is_empty(CHAT).await,
            "job presence must match non-empty tracking set"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn price_at_or_below_target_alerts_prunes_and_cancels_last_job() {
    let h = Harness::new().await;
    h.track("https://a.example/p/1", "500.00", "650.00").await;
    h.fetcher.set_price("https://a.example/p/1", dec("499.99"));

    let report = h.tick().await;

    assert_eq!(report.hits, vec!["https://a.example/p/1"]);
    assert_eq!(report.removed, vec!["https://a.example/p/1"]);
    assert!(report.job_cancelled);
    assert!(h.urls().await.is_empty());
    assert!(!h.scheduler.is_active(CHAT));

    let sent = h.notifier.sent_to(CHAT);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("₹499.99"), "got: {}", sent[0]);
    assert!(sent[0].contains("₹500.00"), "got: {}", sent[0]);
    assert!(sent[0].contains("https://a.example/p/1"));
    h.assert_job_invariant().await;
}

#[tokio::test(start_paused = true)]
async fn price_equal_to_target_is_a_hit() {
    let h = Harness::new().await;
    h.track("https://a.example/p/1", "500.00", "650.00").await;
    h.fetcher.set_price("https://a.example/p/1", dec("500"));

    let report = h.tick().await;
    assert_eq!(report.hits.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn price_above_target_keeps_item_and_job() {
    let h = Harness::new().await;
    h.track("https://a.example/p/1", "500.00", "650.00").await;
    h.fetcher.set_price("https://a.example/p/1", dec("500.01"));

    let report = h.tick().await;

    assert_eq!(report.checked, 1);
    assert!(report.hits.is_empty());
    assert!(report.removed.is_empty());
    assert!(!report.job_cancelled);
    assert_eq!(h.urls().await, vec!["https://a.example/p/1"]);
    assert!(h.notifier.sent().is_empty());
    h.assert_job_invariant().await;
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_untracks_notifies_and_keeps_job_for_remaining_items() {
    let h = Harness::new().await;
    h.track("https://a.example/p/broken", "10", "12").await;
    h.track("https://a.example/p/ok", "10", "12").await;
    h.fetcher.set(
        "https://a.example/p/broken",
        FakeOutcome::Fail(FailureKind::ParseFailure),
    );
    h.fetcher.set_price("https://a.example/p/ok", dec("11"));

    let report = h.tick().await;

    assert_eq!(report.failures, vec!["https://a.example/p/broken"]);
    assert_eq!(report.removed, vec!["https://a.example/p/broken"]);
    assert!(!report.job_cancelled);
    assert_eq!(h.urls().await, vec!["https://a.example/p/ok"]);

    let sent = h.notifier.sent_to(CHAT);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Could not check price for https://a.example/p/broken"));
    h.assert_job_invariant().await;
}

#[tokio::test(start_paused = true)]
async fn every_failure_kind_is_handled_the_same_way() {
    for kind in [
        FailureKind::ConnectionFailure,
        FailureKind::ParseFailure,
        FailureKind::NotFound,
    ] {
        let h = Harness::new().await;
        h.track("https://a.example/p/1", "10", "12").await;
        h.fetcher.set("https://a.example/p/1", FakeOutcome::Fail(kind));

        let report = h.tick().await;

        assert_eq!(report.failures.len(), 1, "kind {kind}");
        assert!(report.job_cancelled, "kind {kind}");
        assert!(h.urls().await.is_empty(), "kind {kind}");
    }
}

#[tokio::test(start_paused = true)]
async fn hung_fetch_times_out_as_connection_failure() {
    let h = Harness::new().await;
    h.track("https://a.example/p/slow", "10", "12").await;
    h.track("https://a.example/p/fast", "10", "12").await;
    h.fetcher.set("https://a.example/p/slow", FakeOutcome::Hang);
    h.fetcher.set_price("https://a.example/p/fast", dec("9"));

    let report = h.tick().await;

    assert_eq!(report.failures, vec!["https://a.example/p/slow"]);
    assert_eq!(report.hits, vec!["https://a.example/p/fast"]);
    assert!(report.job_cancelled);
    assert_eq!(h.notifier.sent_to(CHAT).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn items_are_checked_in_insertion_order() {
    let h = Harness::new().await;
    for n in [3, 1, 2] {
        let url = format!("https://a.example/p/{n}");
        h.track(&url, "10", "12").await;
        h.fetcher.set_price(&url, dec("50"));
    }

    h.tick().await;

    assert_eq!(
        h.fetcher.calls(),
        vec![
            "https://a.example/p/3",
            "https://a.example/p/1",
            "https://a.example/p/2"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn missing_subscriber_record_cancels_stale_job() {
    let h = Harness::new().await;
    h.scheduler.ensure_started(CHAT);

    let report = h.tick().await;

    assert!(report.job_cancelled);
    assert_eq!(report.checked, 0);
    assert!(!h.scheduler.is_active(CHAT));
}

#[tokio::test(start_paused = true)]
async fn empty_subscriber_record_cancels_stale_job() {
    let h = Harness::new().await;
    h.track("https://a.example/p/1", "10", "12").await;
    h.store.remove(CHAT, "https://a.example/p/1").await.unwrap();

    let report = h.tick().await;

    assert!(report.job_cancelled);
    assert!(h.fetcher.calls().is_empty());
    h.assert_job_invariant().await;
}

#[tokio::test(start_paused = true)]
async fn failed_alert_delivery_keeps_item_for_next_tick() {
    let h = Harness::new().await;
    h.track("https://a.example/p/1", "10", "12").await;
    h.fetcher.set_price("https://a.example/p/1", dec("5"));
    h.notifier.set_failing(true);

    let report = h.tick().await;
    assert!(report.hits.is_empty());
    assert_eq!(h.urls().await, vec!["https://a.example/p/1"]);
    h.assert_job_invariant().await;

    h.notifier.set_failing(false);
    let report = h.tick().await;
    assert_eq!(report.hits, vec!["https://a.example/p/1"]);
    h.assert_job_invariant().await;
}

#[tokio::test(start_paused = true)]
async fn failed_prune_save_keeps_items_and_job() {
    let h = Harness::new().await;
    h.track("https://a.example/p/1", "10", "12").await;
    h.fetcher.set_price("https://a.example/p/1", dec("5"));
    h.persistence.fail_saves(true);

    let report = h.tick().await;

    assert_eq!(report.hits.len(), 1);
    assert!(report.removed.is_empty());
    assert!(!report.job_cancelled);
    h.assert_job_invariant().await;
}

#[tokio::test(start_paused = true)]
async fn prune_is_persisted() {
    let h = Harness::new().await;
    h.track("https://a.example/p/1", "10", "12").await;
    h.track("https://a.example/p/2", "10", "12").await;
    h.fetcher.set_price("https://a.example/p/1", dec("5"));
    h.fetcher.set_price("https://a.example/p/2", dec("50"));

    h.tick().await;

    let persisted = h.persistence.snapshot();
    let items: &TrackedItems = &persisted[&CHAT];
    assert_eq!(items.len(), 1);
    assert!(items.contains("https://a.example/p/2"));
}

enum Meddle {
    Untrack(&'static str),
    Track(&'static str),
    /// Untracks the URL and tracks it again with a new target.
    Retrack(&'static str, &'static str),
}

/// Fetcher that mutates the store while a tick is in flight.
struct MeddlingFetcher {
    store: Arc<TrackingStore>,
    inner: FakeFetcher,
    on_url: &'static str,
    meddle: Meddle,
}

#[async_trait]
impl PriceFetcher for MeddlingFetcher {
    async fn fetch_price(&self, url: &str) -> Result<Decimal, ScraperError> {
        if url == self.on_url {
            match self.meddle {
                Meddle::Untrack(target) => {
                    self.store.remove(CHAT, target).await.unwrap();
                }
                Meddle::Track(target) => {
                    let item = TrackedItem::new(target.to_string(), dec("1"), dec("2"));
                    self.store.add(CHAT, item).await.unwrap();
                }
                Meddle::Retrack(url, target) => {
                    self.store.remove(CHAT, url).await.unwrap();
                    let item = TrackedItem::new(url.to_string(), dec(target), dec("12"));
                    self.store.add(CHAT, item).await.unwrap();
                }
            }
        }
        self.inner.fetch_price(url).await
    }
}

fn meddling_worker(h: &Harness, on_url: &'static str, meddle: Meddle) -> PriceCheckWorker {
    PriceCheckWorker::new(
        Arc::clone(&h.store),
        Arc::new(MeddlingFetcher {
            store: Arc::clone(&h.store),
            inner: h.fetcher.clone(),
            on_url,
            meddle,
        }),
        Arc::new(h.notifier.clone()),
        Duration::from_secs(20),
        "₹",
    )
}

#[tokio::test(start_paused = true)]
async fn item_untracked_mid_tick_is_not_resurrected() {
    let h = Harness::new().await;
    h.track("https://a.example/p/1", "10", "12").await;
    h.fetcher.set_price("https://a.example/p/1", dec("5"));
    let worker = meddling_worker(
        &h,
        "https://a.example/p/1",
        Meddle::Untrack("https://a.example/p/1"),
    );

    let report = worker.check_subscriber(CHAT, &h.scheduler).await;

    assert!(report.hits.is_empty(), "untracked items are not alerted: {report:?}");
    assert!(report.removed.is_empty(), "already gone: {report:?}");
    assert!(report.job_cancelled);
    assert!(h.notifier.sent().is_empty());
    assert!(h.urls().await.is_empty());
    h.assert_job_invariant().await;
}

#[tokio::test(start_paused = true)]
async fn item_retracked_mid_tick_keeps_new_entry() {
    let h = Harness::new().await;
    h.track("https://a.example/p/1", "10", "12").await;
    h.fetcher.set_price("https://a.example/p/1", dec("5"));
    let worker = meddling_worker(
        &h,
        "https://a.example/p/1",
        Meddle::Retrack("https://a.example/p/1", "1"),
    );

    let report = worker.check_subscriber(CHAT, &h.scheduler).await;

    assert_eq!(report.checked, 1);
    assert!(report.hits.is_empty(), "stale target must not alert: {report:?}");
    assert!(report.removed.is_empty());
    assert!(!report.job_cancelled);
    assert!(h.notifier.sent().is_empty());
    assert_eq!(h.urls().await, vec!["https://a.example/p/1"]);
    assert_eq!(h.store.list(CHAT).await[0].target_price, dec("1"));
    h.assert_job_invariant().await;
}

#[tokio::test(start_paused = true)]
async fn item_retracked_mid_tick_is_not_failed() {
    let h = Harness::new().await;
    h.track("https://a.example/p/1", "10", "12").await;
    h.fetcher.set(
        "https://a.example/p/1",
        FakeOutcome::Fail(FailureKind::NotFound),
    );
    let worker = meddling_worker(
        &h,
        "https://a.example/p/1",
        Meddle::Retrack("https://a.example/p/1", "1"),
    );

    let report = worker.check_subscriber(CHAT, &h.scheduler).await;

    assert!(report.failures.is_empty());
    assert!(report.removed.is_empty());
    assert!(h.notifier.sent().is_empty());
    assert_eq!(h.urls().await, vec!["https://a.example/p/1"]);
    h.assert_job_invariant().await;
}

#[tokio::test(start_paused = true)]
async fn item_tracked_mid_tick_waits_for_next_tick() {
    let h = Harness::new().await;
    h.track("https://a.example/p/1", "10", "12").await;
    h.fetcher.set_price("https://a.example/p/1", dec("5"));
    h.fetcher.set_price("https://a.example/p/new", dec("1"));
    let worker = meddling_worker(
        &h,
        "https://a.example/p/1",
        Meddle::Track("https://a.example/p/new"),
    );

    let report = worker.check_subscriber(CHAT, &h.scheduler).await;

    assert_eq!(report.checked, 1);
    assert_eq!(report.removed, vec!["https://a.example/p/1"]);
    assert!(!report.job_cancelled);
    assert_eq!(h.urls().await, vec!["https://a.example/p/new"]);
    assert_eq!(h.fetcher.calls(), vec!["https://a.example/p/1"]);
    h.assert_job_invariant().await;
}
