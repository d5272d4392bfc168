//! Subscriber-owned tracking state.
//!
//! A subscriber (one chat) owns an ordered set of [`TrackedItem`]s keyed by
//! normalized product URL. The set preserves insertion order so `/list`
//! output is stable, and holds at most one entry per URL.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::CoreError;

/// Stable identifier of a chat/session that receives alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChatId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(ChatId)
            .map_err(|_| CoreError::InvalidChatId(s.to_string()))
    }
}

/// Strips tracking parameters from a product URL.
///
/// Everything from the first `?` or `#` is dropped, along with trailing
/// slashes, so `https://shop.example/products/tea?ref=abc` and
/// `https://shop.example/products/tea` name the same product.
///
/// # Errors
///
/// Returns [`CoreError::InvalidUrl`] unless the URL is `http(s)://` with a
/// non-empty host.
pub fn normalize_product_url(raw: &str) -> Result<String, CoreError> {
    let trimmed = raw.trim();
    let end = trimmed.find(['?', '#']).unwrap_or(trimmed.len());
    let base = trimmed[..end].trim_end_matches('/');

    let rest = base
        .strip_prefix("https://")
        .or_else(|| base.strip_prefix("http://"))
        .ok_or_else(|| CoreError::InvalidUrl {
            url: raw.to_string(),
            reason: "expected an http:// or https:// URL".to_string(),
        })?;

    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(CoreError::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(base.to_string())
}

/// One product a subscriber is watching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    /// Normalized product URL; see [`normalize_product_url`].
    pub url: String,
    /// Alert fires when the current price is at or below this value.
    pub target_price: Decimal,
    /// Price observed when tracking started.
    pub initial_price: Decimal,
    pub added_at: DateTime<Utc>,
}

impl TrackedItem {
    #[must_use]
    pub fn new(url: String, target_price: Decimal, initial_price: Decimal) -> Self {
        Self {
            url,
            target_price,
            initial_price,
            added_at: Utc::now(),
        }
    }

    /// Inclusive target check: a price equal to the target is a hit.
    #[must_use]
    pub fn is_hit(&self, current_price: Decimal) -> bool {
        current_price <= self.target_price
    }
}

/// Insertion-ordered map of normalized URL → [`TrackedItem`].
///
/// Serialized as a plain array. Deserializing keeps the first entry for
/// each URL and drops later duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TrackedItems {
    items: Vec<TrackedItem>,
}

impl TrackedItems {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    #[must_use]
    pub fn get(&self, url: &str) -> Option<&TrackedItem> {
        self.items.iter().find(|item| item.url == url)
    }

    /// Appends `item` unless its URL is already present.
    ///
    /// Returns `false` and leaves the existing entry (including its
    /// `initial_price`) untouched when the URL is a duplicate.
    pub fn insert(&mut self, item: TrackedItem) -> bool {
        if self.contains(&item.url) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn remove(&mut self, url: &str) -> Option<TrackedItem> {
        let idx = self.items.iter().position(|item| item.url == url)?;
        Some(self.items.remove(idx))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrackedItem> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a TrackedItems {
    type Item = &'a TrackedItem;
    type IntoIter = std::slice::Iter<'a, TrackedItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<TrackedItem> for TrackedItems {
    fn from_iter<I: IntoIterator<Item = TrackedItem>>(iter: I) -> Self {
        let mut items = TrackedItems::new();
        for item in iter {
            items.insert(item);
        }
        items
    }
}

impl<'de> Deserialize<'de> for TrackedItems {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<TrackedItem>::deserialize(deserializer).map(|items| items.into_iter().collect())
    }
}

#[cfg(test)]
#[path = "tracking_test.rs"]
mod tests;
