use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;

use crate::error::ScraperError;
use crate::fetcher::PriceFetcher;
use crate::types::ShopifyProductResponse;

/// HTTP client for a Shopify storefront's per-product `.json` endpoint.
///
/// Network failures, timeouts, and non-2xx responses surface as typed
/// [`ScraperError`]s. No request is retried: a failed fetch is reported to
/// the caller immediately.
pub struct ShopifyClient {
    client: Client,
    timeout_secs: u64,
}

impl ShopifyClient {
    /// Creates a `ShopifyClient` with the given total request timeout and
    /// `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    /// Fetches the current storefront price of the product at `product_url`.
    ///
    /// Requests `<product_url>.json` and reads `product.variants[0].price`.
    /// Redirects are followed.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Timeout`]: no complete response within the timeout.
    /// - [`ScraperError::Http`]: connection, TLS, or body read failure.
    /// - [`ScraperError::NotFound`]: HTTP 404.
    /// - [`ScraperError::UnexpectedStatus`]: any other non-2xx status.
    /// - [`ScraperError::Deserialize`]: body is not the expected JSON shape.
    /// - [`ScraperError::PriceNotFound`]: no product, variant, or price field.
    /// - [`ScraperError::InvalidPrice`]: price field is not a decimal string.
    pub async fn fetch_product_price(&self, product_url: &str) -> Result<Decimal, ScraperError> {
        let url = Self::product_json_url(product_url);
        tracing::debug!(url = %url, "fetching product JSON");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.classify_transport_error(e, &url))?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ScraperError::NotFound { url });
        }

        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.classify_transport_error(e, &url))?;
        let parsed = serde_json::from_str::<ShopifyProductResponse>(&body).map_err(|e| {
            ScraperError::Deserialize {
                context: format!("product JSON from {url}"),
                source: e,
            }
        })?;

        let raw = parsed
            .default_variant_price()
            .ok_or_else(|| ScraperError::PriceNotFound { url: url.clone() })?;

        pricewatch_core::parse_price(&raw).map_err(|_| ScraperError::InvalidPrice {
            url,
            raw: raw.into_owned(),
        })
    }

    fn classify_transport_error(&self, err: reqwest::Error, url: &str) -> ScraperError {
        if err.is_timeout() {
            ScraperError::Timeout {
                url: url.to_owned(),
                secs: self.timeout_secs,
            }
        } else {
            ScraperError::Http(err)
        }
    }

    /// Builds the JSON endpoint URL for a product page URL.
    ///
    /// Any query string or fragment is dropped before `.json` is appended;
    /// `https://shop.example/products/tea?variant=1` becomes
    /// `https://shop.example/products/tea.json`.
    fn product_json_url(product_url: &str) -> String {
        let trimmed = product_url.trim();
        let end = trimmed.find(['?', '#']).unwrap_or(trimmed.len());
        format!("{}.json", trimmed[..end].trim_end_matches('/'))
    }
}

#[async_trait]
impl PriceFetcher for ShopifyClient {
    async fn fetch_price(&self, url: &str) -> Result<Decimal, ScraperError> {
        self.fetch_product_price(url).await
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
