//! Database operations for `products`.

use shopdash_core::NormalizedProduct;
use sqlx::PgPool;

use crate::DbError;

/// Upserts a product row.
///
/// Conflicts on `(tenant_id, source_product_id)` overwrite every mutable
/// column and refresh `updated_at`; `created_at` keeps the value from the
/// first insert.
///
/// Returns the internal `id` of the upserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_product(
    pool: &PgPool,
    tenant_id: &str,
    product: &NormalizedProduct,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO products \
             (tenant_id, source_product_id, title, vendor, product_type, \
              price, inventory, status, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (tenant_id, source_product_id) DO UPDATE SET \
             title        = EXCLUDED.title, \
             vendor       = EXCLUDED.vendor, \
             product_type = EXCLUDED.product_type, \
             price        = EXCLUDED.price, \
             inventory    = EXCLUDED.inventory, \
             status       = EXCLUDED.status, \
             updated_at   = NOW() \
         RETURNING id",
    )
    .bind(tenant_id)
    .bind(&product.source_product_id)
    .bind(&product.title)
    .bind(&product.vendor)
    .bind(&product.product_type)
    .bind(product.price)
    .bind(product.inventory)
    .bind(&product.status)
    .bind(product.created_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Number of products stored for a tenant.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_products(pool: &PgPool, tenant_id: &str) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE tenant_id = $1")
        .bind(tenant_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}
