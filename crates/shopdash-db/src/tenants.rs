//! Database operations for `tenants`.

use chrono::{DateTime, Utc};
use shopdash_core::TenantConfig;
use sqlx::PgPool;

use crate::DbError;

const TENANT_COLUMNS: &str =
    "id, shop_domain, access_token, is_active, settings, created_at, updated_at";

/// A row from the `tenants` table.
#[derive(Clone, sqlx::FromRow)]
pub struct TenantRow {
    pub id: String,
    pub shop_domain: String,
    pub access_token: String,
    pub is_active: bool,
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for TenantRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantRow")
            .field("id", &self.id)
            .field("shop_domain", &self.shop_domain)
            .field("access_token", &"[redacted]")
            .field("is_active", &self.is_active)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

impl From<TenantRow> for TenantConfig {
    fn from(row: TenantRow) -> Self {
        TenantConfig {
            id: row.id,
            shop_domain: row.shop_domain,
            access_token: row.access_token,
            is_active: row.is_active,
            settings: row.settings,
        }
    }
}

/// Fetch a tenant by id. Returns `None` if it does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_tenant(pool: &PgPool, tenant_id: &str) -> Result<Option<TenantRow>, DbError> {
    let row = sqlx::query_as::<_, TenantRow>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"
    ))
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Return the tenant with `tenant_id`, creating an active tenant with empty
/// credentials and `{}` settings if none exists. An existing row is returned
/// untouched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert or the read-back fails.
pub async fn ensure_tenant(pool: &PgPool, tenant_id: &str) -> Result<TenantRow, DbError> {
    sqlx::query("INSERT INTO tenants (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
        .bind(tenant_id)
        .execute(pool)
        .await?;

    get_tenant(pool, tenant_id).await?.ok_or(DbError::NotFound)
}

/// Replace a tenant's shop domain and access token.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no tenant has this id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_tenant_credentials(
    pool: &PgPool,
    tenant_id: &str,
    shop_domain: &str,
    access_token: &str,
) -> Result<TenantRow, DbError> {
    sqlx::query_as::<_, TenantRow>(&format!(
        "UPDATE tenants \
         SET shop_domain = $2, access_token = $3, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {TENANT_COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(shop_domain)
    .bind(access_token)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Enable or disable sync and analytics for a tenant.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no tenant has this id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn set_tenant_active(
    pool: &PgPool,
    tenant_id: &str,
    is_active: bool,
) -> Result<TenantRow, DbError> {
    sqlx::query_as::<_, TenantRow>(&format!(
        "UPDATE tenants SET is_active = $2, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {TENANT_COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(is_active)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// All active tenants, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_tenants(pool: &PgPool) -> Result<Vec<TenantRow>, DbError> {
    let rows = sqlx::query_as::<_, TenantRow>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE is_active ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
