use shopdash_shopify::{MappingError, SourceError};
use thiserror::Error;

use crate::store::StoreError;

/// A sync invocation that could not run to completion.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("tenant {0} not found")]
    TenantNotFound(String),

    #[error("tenant {0} is inactive")]
    TenantInactive(String),

    #[error("tenant {0} has no shop domain or access token configured")]
    MissingCredentials(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TenantNotFound(id) => SyncError::TenantNotFound(id),
            other => SyncError::Store(other),
        }
    }
}

/// Why a single fetched record was not stored.
#[derive(Debug, Error)]
pub enum RecordFailure {
    #[error("mapping failed: {0}")]
    Mapping(#[from] MappingError),

    #[error("upsert failed: {0}")]
    Store(#[from] StoreError),
}

/// One record that was fetched but not stored. The batch carries on.
#[derive(Debug, Error)]
#[error("record {}: {reason}", .source_id.as_deref().unwrap_or("<no id>"))]
pub struct RecordError {
    /// Shopify id, when the payload had a readable one.
    pub source_id: Option<String>,
    #[source]
    pub reason: RecordFailure,
}

/// Analytics requests only fail for tenant problems; query failures degrade
/// to empty reports instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("tenant {0} not found")]
    TenantNotFound(String),

    #[error("tenant {0} is inactive")]
    TenantInactive(String),
}
