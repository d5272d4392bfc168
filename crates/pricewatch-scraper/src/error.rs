use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("product not found: {url}")]
    NotFound { url: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unparsable price \"{raw}\" from {url}")]
    InvalidPrice { url: String, raw: String },

    #[error("no price field in product data from {url}")]
    PriceNotFound { url: String },
}

/// Coarse classification of a failed price fetch.
///
/// The tick handler treats every kind the same way (notify and untrack);
/// the kind only feeds logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ConnectionFailure,
    ParseFailure,
    NotFound,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::ConnectionFailure => write!(f, "connection_failure"),
            FailureKind::ParseFailure => write!(f, "parse_failure"),
            FailureKind::NotFound => write!(f, "not_found"),
        }
    }
}

impl ScraperError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            ScraperError::Http(_)
            | ScraperError::Timeout { .. }
            | ScraperError::UnexpectedStatus { .. } => FailureKind::ConnectionFailure,
            ScraperError::Deserialize { .. } | ScraperError::InvalidPrice { .. } => {
                FailureKind::ParseFailure
            }
            ScraperError::NotFound { .. } | ScraperError::PriceNotFound { .. } => {
                FailureKind::NotFound
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_every_variant() {
        let timeout = ScraperError::Timeout {
            url: "https://a.example/p.json".to_owned(),
            secs: 20,
        };
        assert_eq!(timeout.kind(), FailureKind::ConnectionFailure);

        let status = ScraperError::UnexpectedStatus {
            status: 503,
            url: "https://a.example/p.json".to_owned(),
        };
        assert_eq!(status.kind(), FailureKind::ConnectionFailure);

        let source = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err();
        let parse = ScraperError::Deserialize {
            context: "test".to_owned(),
            source,
        };
        assert_eq!(parse.kind(), FailureKind::ParseFailure);

        let price = ScraperError::InvalidPrice {
            url: "https://a.example/p.json".to_owned(),
            raw: "free".to_owned(),
        };
        assert_eq!(price.kind(), FailureKind::ParseFailure);

        let missing = ScraperError::PriceNotFound {
            url: "https://a.example/p.json".to_owned(),
        };
        assert_eq!(missing.kind(), FailureKind::NotFound);

        let gone = ScraperError::NotFound {
            url: "https://a.example/p.json".to_owned(),
        };
        assert_eq!(gone.kind(), FailureKind::NotFound);
    }

    #[test]
    fn kind_display_is_snake_case() {
        assert_eq!(
            FailureKind::ConnectionFailure.to_string(),
            "connection_failure"
        );
        assert_eq!(FailureKind::ParseFailure.to_string(), "parse_failure");
        assert_eq!(FailureKind::NotFound.to_string(), "not_found");
    }
}
