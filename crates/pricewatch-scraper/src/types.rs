//! Response types for a Shopify storefront's per-product JSON endpoint.
//!
//! Appending `.json` to a product page URL (`/products/<handle>.json`)
//! returns `{"product": {..., "variants": [...]}}`. Only the fields needed
//! to read the storefront price are modelled; everything else is ignored.
//!
//! ### `price` on variants
//! A decimal string in major currency units, e.g. `"1299.00"`. It is NOT an
//! integer amount of cents, unlike the cart and checkout APIs. Some proxies
//! and headless stores emit a bare JSON number instead; both are accepted.
//!
//! ### Variant order
//! The first variant is the storefront default and is the one whose price
//! is tracked.

use std::borrow::Cow;

use serde::Deserialize;

/// Top-level response from `GET /products/<handle>.json`.
#[derive(Debug, Deserialize)]
pub struct ShopifyProductResponse {
    #[serde(default)]
    pub product: Option<ShopifyProduct>,
}

#[derive(Debug, Deserialize)]
pub struct ShopifyProduct {
    #[serde(default)]
    pub id: Option<i64>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub variants: Vec<ShopifyVariant>,
}

#[derive(Debug, Deserialize)]
pub struct ShopifyVariant {
    #[serde(default)]
    pub id: Option<i64>,

    /// Current price. Absent on some headless stores.
    #[serde(default)]
    pub price: Option<ShopifyPrice>,
}

/// A variant price, as a decimal string or a JSON number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ShopifyPrice {
    Text(String),
    Number(serde_json::Number),
}

impl ShopifyPrice {
    /// The price as text in major currency units.
    #[must_use]
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(raw) => Cow::Borrowed(raw),
            Self::Number(n) => Cow::Owned(n.to_string()),
        }
    }
}

impl ShopifyProductResponse {
    /// Raw price text of the default (first) variant, if present.
    #[must_use]
    pub fn default_variant_price(&self) -> Option<Cow<'_, str>> {
        self.product
            .as_ref()?
            .variants
            .first()?
            .price
            .as_ref()
            .map(ShopifyPrice::as_text)
    }
}
