use rust_decimal::Decimal;
use shopdash_core::ResourceKind;
use thiserror::Error;

/// Failure talking to the Shopify Admin API. None of these are retried here;
/// callers decide whether to try again later.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connection failure, timeout, or a body that could not be read.
    #[error("source unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("upstream server error {status} from {url}")]
    ServerError { status: u16, url: String },

    #[error("credentials rejected by {shop_domain} (HTTP {status})")]
    Auth { shop_domain: String, status: u16 },

    #[error("rate limited by {shop_domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        shop_domain: String,
        retry_after_secs: u64,
    },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("response from {url} has no \"{key}\" array")]
    MissingEnvelope { url: String, key: &'static str },

    #[error("pagination limit reached for {shop_domain}: exceeded {max_pages} pages")]
    PaginationLimit {
        shop_domain: String,
        max_pages: usize,
    },

    #[error("invalid shop domain \"{shop_domain}\": {reason}")]
    InvalidShopDomain { shop_domain: String, reason: String },
}

impl SourceError {
    /// Network failures and 5xx responses.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            SourceError::Unavailable(_) | SourceError::ServerError { .. }
        )
    }

    /// Conditions that may clear up on a later attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.is_unavailable() || matches!(self, SourceError::RateLimited { .. })
    }
}

/// A single raw record that could not be turned into a store row.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("record is not a valid {kind} payload: {source}")]
    Malformed {
        kind: ResourceKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("required field `{field}` is missing")]
    MissingField { field: &'static str },

    #[error("field `{field}` has invalid amount {value:?}")]
    InvalidAmount { field: &'static str, value: String },

    #[error("field `{field}` must not be negative (got {value})")]
    NegativeAmount { field: &'static str, value: Decimal },

    #[error("field `{field}` is out of range (got {value})")]
    OutOfRange { field: &'static str, value: i64 },

    #[error("field `{field}` has invalid timestamp {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },
}
