use crate::app_config::{AppConfig, Environment, SyncStrategy};
use crate::ConfigError;

/// Largest page the Shopify Admin REST API will return.
const MAX_SHOPIFY_PAGE_SIZE: u32 = 250;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Does not read `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Parses and validates configuration through an injectable env lookup so
/// tests can feed a `HashMap` instead of mutating the process environment.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url =
        lookup("DATABASE_URL").map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".into()))?;

    let env = parse_environment(&or_default("SHOPDASH_ENV", "development"))?;

    let bind_addr = or_default("SHOPDASH_BIND_ADDR", "0.0.0.0:3005")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("SHOPDASH_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("SHOPDASH_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("SHOPDASH_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("SHOPDASH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("SHOPDASH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let shopify_api_version = or_default("SHOPDASH_SHOPIFY_API_VERSION", "2024-01");
    let shopify_request_timeout_secs = parse_u64("SHOPDASH_SHOPIFY_REQUEST_TIMEOUT_SECS", "10")?;
    let shopify_page_size =
        parse_u32("SHOPDASH_SHOPIFY_PAGE_SIZE", "250")?.clamp(1, MAX_SHOPIFY_PAGE_SIZE);
    let shopify_max_pages = parse_usize("SHOPDASH_SHOPIFY_MAX_PAGES", "200")?;
    let shopify_user_agent = or_default(
        "SHOPDASH_SHOPIFY_USER_AGENT",
        "shopdash/0.1 (analytics-sync)",
    );

    let cache_ttl_secs = parse_u64("SHOPDASH_CACHE_TTL_SECS", "300")?;
    let sync_strategy = or_default("SHOPDASH_SYNC_STRATEGY", "concurrent")
        .parse::<SyncStrategy>()
        .map_err(|e| invalid("SHOPDASH_SYNC_STRATEGY", e.to_string()))?;
    let sync_cron = lookup("SHOPDASH_SYNC_CRON")
        .ok()
        .filter(|s| !s.trim().is_empty());

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        shopify_api_version,
        shopify_request_timeout_secs,
        shopify_page_size,
        shopify_max_pages,
        shopify_user_agent,
        cache_ttl_secs,
        sync_strategy,
        sync_cron,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test` or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SHOPDASH_ENV".to_string(),
            reason: format!("expected development, test or production; got {other:?}"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
