pub mod client;
pub mod error;
pub mod fake;
pub mod fetcher;
pub mod types;

pub use client::ShopifyClient;
pub use error::{FailureKind, ScraperError};
pub use fake::{FakeFetcher, FakeOutcome};
pub use fetcher::PriceFetcher;
pub use types::{ShopifyPrice, ShopifyProduct, ShopifyProductResponse, ShopifyVariant};
