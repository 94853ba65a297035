use std::net::SocketAddr;

use crate::CoreError;

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

/// How `sync_all` schedules its three resource syncs.
///
/// `Concurrent` runs customers, products and orders at the same time, so an
/// order can be stored before its customer exists and keep a `NULL` link.
/// `CustomersFirst` finishes the customer sync before the other two start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncStrategy {
    #[default]
    Concurrent,
    CustomersFirst,
}

impl std::str::FromStr for SyncStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "concurrent" => Ok(Self::Concurrent),
            "customers-first" => Ok(Self::CustomersFirst),
            other => Err(CoreError::UnknownSyncStrategy(other.to_string())),
        }
    }
}

impl std::fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStrategy::Concurrent => write!(f, "concurrent"),
            SyncStrategy::CustomersFirst => write!(f, "customers-first"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub shopify_api_version: String,
    pub shopify_request_timeout_secs: u64,
    pub shopify_page_size: u32,
    pub shopify_max_pages: usize,
    pub shopify_user_agent: String,
    pub cache_ttl_secs: u64,
    pub sync_strategy: SyncStrategy,
    pub sync_cron: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("shopify_api_version", &self.shopify_api_version)
            .field(
                "shopify_request_timeout_secs",
                &self.shopify_request_timeout_secs,
            )
            .field("shopify_page_size", &self.shopify_page_size)
            .field("shopify_max_pages", &self.shopify_max_pages)
            .field("shopify_user_agent", &self.shopify_user_agent)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("sync_strategy", &self.sync_strategy)
            .field("sync_cron", &self.sync_cron)
            .finish()
    }
}
