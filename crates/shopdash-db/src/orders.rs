//! Database operations for `orders`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use shopdash_core::NormalizedOrder;
use sqlx::PgPool;

use crate::DbError;

/// Order count and revenue for one tenant.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct OrderTotalsRow {
    pub order_count: i64,
    pub total_revenue: Decimal,
}

/// Orders placed on one UTC calendar day.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct DailyOrdersRow {
    pub day: NaiveDate,
    pub order_count: i64,
    pub revenue: Decimal,
}

/// Orders placed in one UTC month; `month` is its first day.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct MonthlySalesRow {
    pub month: NaiveDate,
    pub order_count: i64,
    pub gross_revenue: Decimal,
    pub discounts: Decimal,
}

/// Upserts an order row.
///
/// `customer_id` is the already-resolved internal customer id, or `None`
/// when the purchasing customer is unknown locally. Conflicts on
/// `(tenant_id, source_order_id)` overwrite every mutable column, including
/// the customer link, and refresh `updated_at`.
///
/// Returns the internal `id` of the upserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails (for example a negative
/// amount tripping the `CHECK` constraint).
pub async fn upsert_order(
    pool: &PgPool,
    tenant_id: &str,
    customer_id: Option<i64>,
    order: &NormalizedOrder,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO orders \
             (tenant_id, source_order_id, customer_id, total_price, total_discounts, \
              financial_status, fulfillment_status, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (tenant_id, source_order_id) DO UPDATE SET \
             customer_id        = EXCLUDED.customer_id, \
             total_price        = EXCLUDED.total_price, \
             total_discounts    = EXCLUDED.total_discounts, \
             financial_status   = EXCLUDED.financial_status, \
             fulfillment_status = EXCLUDED.fulfillment_status, \
             updated_at         = NOW() \
         RETURNING id",
    )
    .bind(tenant_id)
    .bind(&order.source_order_id)
    .bind(customer_id)
    .bind(order.total_price)
    .bind(order.total_discounts)
    .bind(order.financial_status.as_str())
    .bind(&order.fulfillment_status)
    .bind(order.created_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn order_totals(pool: &PgPool, tenant_id: &str) -> Result<OrderTotalsRow, DbError> {
    let row = sqlx::query_as::<_, OrderTotalsRow>(
        "SELECT COUNT(*) AS order_count, \
                COALESCE(SUM(total_price), 0) AS total_revenue \
         FROM orders WHERE tenant_id = $1",
    )
    .bind(tenant_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Order count and revenue per UTC day, newest day first, at most `limit`
/// days. `start` and `end` bound an inclusive range of UTC days; `None` is
/// open.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_orders_by_day(
    pool: &PgPool,
    tenant_id: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    limit: i64,
) -> Result<Vec<DailyOrdersRow>, DbError> {
    let rows = sqlx::query_as::<_, DailyOrdersRow>(
        "SELECT \
            (created_at AT TIME ZONE 'UTC')::date AS day, \
            COUNT(*) AS order_count, \
            SUM(total_price) AS revenue \
         FROM orders \
         WHERE tenant_id = $1 \
           AND ($2::date IS NULL OR created_at >= ($2::date)::timestamp AT TIME ZONE 'UTC') \
           AND ($3::date IS NULL OR created_at < ($3::date + 1)::timestamp AT TIME ZONE 'UTC') \
         GROUP BY 1 \
         ORDER BY 1 DESC \
         LIMIT $4",
    )
    .bind(tenant_id)
    .bind(start)
    .bind(end)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Order count, gross revenue and discounts per UTC month, newest month
/// first, at most `limit` months.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sales_by_month(
    pool: &PgPool,
    tenant_id: &str,
    limit: i64,
) -> Result<Vec<MonthlySalesRow>, DbError> {
    let rows = sqlx::query_as::<_, MonthlySalesRow>(
        "SELECT \
            date_trunc('month', created_at AT TIME ZONE 'UTC')::date AS month, \
            COUNT(*) AS order_count, \
            SUM(total_price) AS gross_revenue, \
            SUM(total_discounts) AS discounts \
         FROM orders \
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
