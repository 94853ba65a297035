//! Database operations for `customers`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shopdash_core::NormalizedCustomer;
use sqlx::PgPool;

use crate::DbError;

const CUSTOMER_COLUMNS: &str = "id, tenant_id, source_customer_id, email, first_name, last_name, \
     total_spent, orders_count, created_at, updated_at";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `customers` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: i64,
    pub tenant_id: String,
    pub source_customer_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub total_spent: Decimal,
    pub orders_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Customers created in one UTC month; `month` is its first day.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct CohortRow {
    pub month: NaiveDate,
    pub customer_count: i64,
    /// Customers with more than one order.
    pub returning_count: i64,
    pub total_spent: Decimal,
}

/// One page of a customer search plus the total number of matches.
#[derive(Debug, Clone)]
pub struct CustomerPage {
    pub rows: Vec<CustomerRow>,
    pub total: i64,
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Upserts a customer row.
///
/// Conflicts on `(tenant_id, source_customer_id)` overwrite contact details
/// and the spend snapshot and refresh `updated_at`; `created_at` keeps the
/// value from the first insert.
///
/// Returns the internal `id` of the upserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_customer(
    pool: &PgPool,
    tenant_id: &str,
    customer: &NormalizedCustomer,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO customers \
             (tenant_id, source_customer_id, email, first_name, last_name, \
              total_spent, orders_count, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (tenant_id, source_customer_id) DO UPDATE SET \
             email        = EXCLUDED.email, \
             first_name   = EXCLUDED.first_name, \
             last_name    = EXCLUDED.last_name, \
             total_spent  = EXCLUDED.total_spent, \
             orders_count = EXCLUDED.orders_count, \
             updated_at   = NOW() \
         RETURNING id",
    )
    .bind(tenant_id)
    .bind(&customer.source_customer_id)
    .bind(&customer.email)
    .bind(&customer.first_name)
    .bind(&customer.last_name)
    .bind(customer.total_spent)
    .bind(customer.orders_count)
    .bind(customer.created_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Internal id of the customer with this Shopify id in this tenant.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_customer_id(
    pool: &PgPool,
    tenant_id: &str,
    source_customer_id: &str,
) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM customers WHERE tenant_id = $1 AND source_customer_id = $2",
    )
    .bind(tenant_id)
    .bind(source_customer_id)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_customers(pool: &PgPool, tenant_id: &str) -> Result<i64, DbError> {
    let count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM customers WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(pool)
            .await?;

    Ok(count)
}

/// Highest spenders first. Ties keep insertion order (`id` ascending).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_top_customers(
    pool: &PgPool,
    tenant_id: &str,
    limit: i64,
) -> Result<Vec<CustomerRow>, DbError> {
    let rows = sqlx::query_as::<_, CustomerRow>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers \
         WHERE tenant_id = $1 \
         ORDER BY total_spent DESC, id ASC \
         LIMIT $2"
    ))
    .bind(tenant_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Signup cohorts per UTC month, newest month first, at most `limit` months.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_customer_cohorts(
    pool: &PgPool,
    tenant_id: &str,
    limit: i64,
) -> Result<Vec<CohortRow>, DbError> {
    let rows = sqlx::query_as::<_, CohortRow>(
        "SELECT \
            date_trunc('month', created_at AT TIME ZONE 'UTC')::date AS month, \
            COUNT(*) AS customer_count, \
            COUNT(*) FILTER (WHERE orders_count > 1) AS returning_count, \
            SUM(total_spent) AS total_spent \
         FROM customers \
         WHERE tenant_id = $1 \
         GROUP BY 1 \
         ORDER BY 1 DESC \
         LIMIT $2",
    )
    .bind(tenant_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Case-insensitive substring search over email and names, highest spenders
/// first. `search = None` lists everyone.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn search_customers(
    pool: &PgPool,
    tenant_id: &str,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<CustomerPage, DbError> {
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", escape_like(s)));

    let filter = "tenant_id = $1 AND ($2::text IS NULL \
                  OR email ILIKE $2 OR first_name ILIKE $2 OR last_name ILIKE $2)";

    let total = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT COUNT(*) FROM customers WHERE {filter}"
    ))
    .bind(tenant_id)
    .bind(pattern.as_deref())
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as::<_, CustomerRow>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers \
         WHERE {filter} \
         ORDER BY total_spent DESC, id ASC \
         LIMIT $3 OFFSET $4"
    ))
    .bind(tenant_id)
    .bind(pattern.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(CustomerPage { rows, total })
}

/// Escapes `ILIKE` wildcards so user input matches literally.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("ada"), "ada");
    }
}
