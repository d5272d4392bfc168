//! Per-subscriber repeating price-check jobs.
//!
//! Each subscriber with tracked items owns one tokio task that sleeps for an
//! initial delay, then ticks at a fixed interval. The scheduler maps chat id
//! → cancellation handle, so start/cancel are direct lookups. Cancellation
//! is cooperative: a cancelled job never ticks again, but a tick already in
//! progress runs to completion.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use pricewatch_core::ChatId;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Longest first delay or interval a job honors; larger values are clamped.
pub const MAX_JOB_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Work performed on every job tick.
#[async_trait]
pub trait TickHandler: Send + Sync + 'static {
    async fn on_tick(&self, chat_id: ChatId, scheduler: &JobScheduler);
}

/// Deterministic job name for a subscriber, used in logs.
#[must_use]
pub fn job_name(chat_id: ChatId) -> String {
    format!("job_{chat_id}")
}

struct JobHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl JobHandle {
    fn is_live(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }
}

struct Inner {
    jobs: std::sync::Mutex<HashMap<ChatId, JobHandle>>,
    handler: Arc<dyn TickHandler>,
    interval: Duration,
    first_delay: Duration,
    shutdown: CancellationToken,
}

/// Cloneable handle to the job table.
#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<Inner>,
}

impl JobScheduler {
    /// Creates a scheduler whose jobs run `handler` every `interval`, with
    /// the first tick `first_delay` after the job starts. Both are clamped
    /// to [`MAX_JOB_DELAY`].
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    #[must_use]
    pub fn new(handler: Arc<dyn TickHandler>, interval: Duration, first_delay: Duration) -> Self {
        assert!(!interval.is_zero(), "job interval must be non-zero");
        Self {
            inner: Arc::new(Inner {
                jobs: std::sync::Mutex::new(HashMap::new()),
                handler,
                interval: interval.min(MAX_JOB_DELAY),
                first_delay: first_delay.min(MAX_JOB_DELAY),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Starts `chat_id`'s job unless a live one already exists.
    ///
    /// Returns `true` if a new job was started. Must be called from within a
    /// tokio runtime.
    pub fn ensure_started(&self, chat_id: ChatId) -> bool {
        self.ensure_started_with_delay(chat_id, self.inner.first_delay)
    }

    /// Like [`Self::ensure_started`], with an explicit delay before the first
    /// tick (clamped to [`MAX_JOB_DELAY`]).
    pub fn ensure_started_with_delay(&self, chat_id: ChatId, first_delay: Duration) -> bool {
        if self.inner.shutdown.is_cancelled() {
            tracing::debug!(chat_id = %chat_id, "scheduler is shut down; not starting job");
            return false;
        }

        let mut jobs = self.jobs();
        if jobs.get(&chat_id).is_some_and(JobHandle::is_live) {
            return false;
        }

        let first_delay = first_delay.min(MAX_JOB_DELAY);
        let start = Instant::now() + first_delay;
        let token = self.inner.shutdown.child_token();
        let span = tracing::info_span!("job", name = %job_name(chat_id), chat_id = %chat_id);
        let task = tokio::spawn(
            run_job(
                Arc::downgrade(&self.inner),
                chat_id,
                token.clone(),
                start,
                self.inner.interval,
            )
            .instrument(span),
        );
        jobs.insert(chat_id, JobHandle { token, task });

        tracing::info!(
            chat_id = %chat_id,
            job = %job_name(chat_id),
            first_delay_secs = first_delay.as_secs(),
            interval_secs = self.inner.interval.as_secs(),
            "started price-check job"
        );
        true
    }

    /// Cancels `chat_id`'s job if one exists. Returns `true` if a job was removed.
    pub fn cancel(&self, chat_id: ChatId) -> bool {
        let Some(handle) = self.jobs().remove(&chat_id) else {
            return false;
        };
        handle.token.cancel();
        tracing::info!(chat_id = %chat_id, job = %job_name(chat_id), "cancelled price-check job");
        true
    }

    #[must_use]
    pub fn is_active(&self, chat_id: ChatId) -> bool {
        self.jobs().get(&chat_id).is_some_and(JobHandle::is_live)
    }

    /// Subscribers with a live job, in id order.
    #[must_use]
    pub fn active_jobs(&self) -> Vec<ChatId> {
        let mut ids: Vec<ChatId> = self
            .jobs()
            .iter()
            .filter(|(_, handle)| handle.is_live())
            .map(|(chat_id, _)| *chat_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Cancels every job and refuses new ones.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let drained = self.jobs().drain().count();
        tracing::info!(jobs = drained, "scheduler shut down");
    }

    fn jobs(&self) -> std::sync::MutexGuard<'_, HashMap<ChatId, JobHandle>> {
        self.inner
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_job(
    inner: Weak<Inner>,
    chat_id: ChatId,
    token: CancellationToken,
    start: Instant,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval_at(start, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        let handler = Arc::clone(&inner.handler);
        let scheduler = JobScheduler { inner };
        handler.on_tick(chat_id, &scheduler).await;
    }

    tracing::debug!(chat_id = %chat_id, "price-check job stopped");
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
