//! Scripted [`PriceFetcher`] for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::{FailureKind, ScraperError};
use crate::fetcher::PriceFetcher;

/// What a [`FakeFetcher`] returns for a URL.
#[derive(Debug, Clone)]
pub enum FakeOutcome {
    Price(Decimal),
    Fail(FailureKind),
    /// Never resolves; exercises caller-side timeouts.
    Hang,
}

#[derive(Default)]
struct FakeState {
    outcomes: HashMap<String, FakeOutcome>,
    calls: Vec<String>,
}

/// Fetcher that answers from a URL → outcome table and records every call.
///
/// URLs with no scripted outcome fail with [`FailureKind::NotFound`].
#[derive(Clone, Default)]
pub struct FakeFetcher {
    state: Arc<Mutex<FakeState>>,
}

impl FakeFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: &str, outcome: FakeOutcome) {
        self.lock().outcomes.insert(url.to_owned(), outcome);
    }

    pub fn set_price(&self, url: &str, price: Decimal) {
        self.set(url, FakeOutcome::Price(price));
    }

    /// URLs requested so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn failure(kind: FailureKind, url: &str) -> ScraperError {
    match kind {
        FailureKind::ConnectionFailure => ScraperError::UnexpectedStatus {
            status: 503,
            url: url.to_owned(),
        },
        FailureKind::ParseFailure => ScraperError::InvalidPrice {
            url: url.to_owned(),
            raw: "n/a".to_owned(),
        },
        FailureKind::NotFound => ScraperError::PriceNotFound {
            url: url.to_owned(),
        },
    }
}

#[async_trait]
impl PriceFetcher for FakeFetcher {
    async fn fetch_price(&self, url: &str) -> Result<Decimal, ScraperError> {
        let outcome = {
            let mut state = self.lock();
            state.calls.push(url.to_owned());
            state.outcomes.get(url).cloned()
        };

        match outcome {
            Some(FakeOutcome::Price(price)) => Ok(price),
            Some(FakeOutcome::Fail(kind)) => Err(failure(kind, url)),
            Some(FakeOutcome::Hang) => std::future::pending().await,
            None => Err(failure(FailureKind::NotFound, url)),
        }
    }
}
