//! User-facing message text.

use pricewatch_core::{format_price, Decimal, TrackedItem};
use pricewatch_scraper::{FailureKind, ScraperError};

pub const TRACK_USAGE: &str = "/track <URL> <TARGET_PRICE>";
pub const UNTRACK_USAGE: &str = "/untrack <URL>";

#[must_use]
pub fn welcome() -> String {
    format!(
        "👋 Welcome to the Price Tracker Bot!\n\n\
         Use the following commands:\n\n\
         🔹 {TRACK_USAGE}\n   to start tracking a new product.\n\n\
         🔹 /list\n   to see all products you are tracking.\n\n\
         🔹 {UNTRACK_USAGE}\n   to stop tracking a product."
    )
}

#[must_use]
pub fn unknown_command(name: &str) -> String {
    format!("🤔 Unknown command /{name}. Send /help to see what I can do.")
}

#[must_use]
pub fn invalid_format(usage: &str) -> String {
    format!("⚠️ Invalid format. Please use:\n{usage}")
}

#[must_use]
pub fn already_tracking() -> String {
    "ℹ️ You are already tracking this product. Use /list to see your tracked items.".to_string()
}

#[must_use]
pub fn not_tracking() -> String {
    "❌ You are not tracking this product.".to_string()
}

#[must_use]
pub fn storage_failed() -> String {
    "❌ Could not save your tracking list. Please try again later.".to_string()
}

#[must_use]
pub fn tracking_setup_failed(err: &ScraperError) -> String {
    let reason = match err.kind() {
        FailureKind::ConnectionFailure => "Failed to connect to the website. Please check the URL.",
        FailureKind::ParseFailure => {
            "The website's data format seems to have changed. Could not extract price."
        }
        FailureKind::NotFound => "Price information not found for this product.",
    };
    format!("❌ Error setting up tracking: {reason}")
}

#[must_use]
pub fn tracking_started(item: &TrackedItem, symbol: &str) -> String {
    format!(
        "✅ Tracking started!\n\n\
         Product: {url}\n\
         Current Price: {current}\n\
         Your Target: {target}\n\n\
         I will notify you if the price drops to or below your target.",
        url = item.url,
        current = format_price(item.initial_price, symbol),
        target = format_price(item.target_price, symbol),
    )
}

#[must_use]
pub fn stopped_tracking(url: &str) -> String {
    format!("✅ Stopped tracking: {url}")
}

#[must_use]
pub fn tracked_list(items: &[TrackedItem], symbol: &str) -> String {
    if items.is_empty() {
        return "You are not tracking any products yet. Use /track to add one!".to_string();
    }

    let mut message = String::from("🛍️ Here are the products you are tracking:\n");
    for item in items {
        message.push_str(&format!(
            "\n🔗 Product: {}\n🎯 Target Price: {}\n📈 Initial Price: {}\n",
            item.url,
            format_price(item.target_price, symbol),
            format_price(item.initial_price, symbol),
        ));
    }
    message
}

#[must_use]
pub fn price_alert(url: &str, current: Decimal, target: Decimal, symbol: &str) -> String {
    format!(
        "🎉 Price Drop Alert! 🎉\n\n\
         The price for a product you're tracking has dropped to {current}!\n\n\
         🎯 Your Target: {target}\n\
         🔗 Get it here: {url}",
        current = format_price(current, symbol),
        target = format_price(target, symbol),
    )
}

#[must_use]
pub fn check_failed(url: &str) -> String {
    format!(
        "⚠️ Could not check price for {url}. It may be out of stock or the page has changed. \
         It will be untracked."
    )
}
