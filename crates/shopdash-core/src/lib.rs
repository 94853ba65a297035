pub mod app_config;
pub mod cache;
pub mod config;
pub mod records;
pub mod resource;
pub mod tenant;

pub use app_config::{AppConfig, Environment, SyncStrategy};
pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use config::{load_app_config, load_app_config_from_env};
pub use records::{
    FinancialStatus, NormalizedCustomer, NormalizedOrder, NormalizedProduct, DEFAULT_PRODUCT_STATUS,
};
pub use resource::ResourceKind;
pub use tenant::TenantConfig;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown resource kind: {0}")]
    UnknownResourceKind(String),

    #[error("unknown sync strategy: {0}")]
    UnknownSyncStrategy(String),
}
