use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    /// JSON file holding every subscriber's tracked items.
    pub state_path: PathBuf,
    pub check_interval_secs: u64,
    /// Delay between registering a job and its first tick.
    pub first_check_delay_secs: u64,
    /// Upper bound of the random extra delay added to jobs restored at startup.
    pub startup_jitter_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub currency_symbol: String,
    pub webhook_url: Option<String>,
}

impl AppConfig {
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    #[must_use]
    pub fn first_check_delay(&self) -> Duration {
        Duration::from_secs(self.first_check_delay_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("state_path", &self.state_path)
            .field("check_interval_secs", &self.check_interval_secs)
            .field("first_check_delay_secs", &self.first_check_delay_secs)
            .field("startup_jitter_secs", &self.startup_jitter_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("currency_symbol", &self.currency_symbol)
            .field(
                "webhook_url",
                &self.webhook_url.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}
