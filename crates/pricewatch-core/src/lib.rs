pub mod app_config;
pub mod config;
pub mod price;
pub mod tracking;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, MAX_SCHEDULE_SECS};
pub use price::{format_price, parse_price};
pub use rust_decimal::Decimal;
pub use tracking::{normalize_product_url, ChatId, TrackedItem, TrackedItems};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid price \"{raw}\": {reason}")]
    InvalidPrice { raw: String, reason: String },

    #[error("invalid product URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid chat id \"{0}\"")]
    InvalidChatId(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
