use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::ScraperError;

/// Source of current product prices.
///
/// Implementations return the price in major currency units or a
/// [`ScraperError`] describing why no price could be read.
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    async fn fetch_price(&self, url: &str) -> Result<Decimal, ScraperError>;
}
