use async_trait::async_trait;
use shopdash_core::{NormalizedCustomer, NormalizedOrder, NormalizedProduct, TenantConfig};
use shopdash_db::{CustomerRow, DbError};
use sqlx::PgPool;

use super::{
    AnalyticsStore, CohortBucket, CustomerPage, CustomerSummary, DashboardTotals, DateRange,
    DayBucket, SalesBucket, StoreError, SyncStore, TenantRegistry,
};

/// Postgres-backed store delegating to `shopdash-db`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn tenant_error(tenant_id: &str) -> impl FnOnce(DbError) -> StoreError + '_ {
    move |e| match e {
        DbError::NotFound => StoreError::TenantNotFound(tenant_id.to_owned()),
        other => StoreError::Db(other),
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl From<CustomerRow> for CustomerSummary {
    fn from(row: CustomerRow) -> Self {
        CustomerSummary {
            source_customer_id: row.source_customer_id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            total_spent: row.total_spent,
            orders_count: row.orders_count,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl TenantRegistry for PgStore {
    async fn find(&self, tenant_id: &str) -> Result<Option<TenantConfig>, StoreError> {
        let row = shopdash_db::get_tenant(&self.pool, tenant_id).await?;
        Ok(row.map(TenantConfig::from))
    }

    async fn ensure(&self, tenant_id: &str) -> Result<TenantConfig, StoreError> {
        let row = shopdash_db::ensure_tenant(&self.pool, tenant_id).await?;
        Ok(row.into())
    }

    async fn update_credentials(
        &self,
        tenant_id: &str,
        shop_domain: &str,
        access_token: &str,
    ) -> Result<TenantConfig, StoreError> {
        shopdash_db::update_tenant_credentials(&self.pool, tenant_id, shop_domain, access_token)
            .await
            .map(TenantConfig::from)
            .map_err(tenant_error(tenant_id))
    }

    async fn set_active(
        &self,
        tenant_id: &str,
        is_active: bool,
    ) -> Result<TenantConfig, StoreError> {
        shopdash_db::set_tenant_active(&self.pool, tenant_id, is_active)
            .await
            .map(TenantConfig::from)
            .map_err(tenant_error(tenant_id))
    }

    async fn list_active(&self) -> Result<Vec<TenantConfig>, StoreError> {
        let rows = shopdash_db::list_active_tenants(&self.pool).await?;
        Ok(rows.into_iter().map(TenantConfig::from).collect())
    }
}

#[async_trait]
impl SyncStore for PgStore {
    async fn upsert_customer(
        &self,
        tenant_id: &str,
        customer: &NormalizedCustomer,
    ) -> Result<i64, StoreError> {
        Ok(shopdash_db::upsert_customer(&self.pool, tenant_id, customer).await?)
    }

    async fn upsert_product(
        &self,
        tenant_id: &str,
        product: &NormalizedProduct,
    ) -> Result<i64, StoreError> {
        Ok(shopdash_db::upsert_product(&self.pool, tenant_id, product).await?)
    }

    async fn find_customer_id(
        &self,
        tenant_id: &str,
        source_customer_id: &str,
    ) -> Result<Option<i64>, StoreError> {
        Ok(shopdash_db::find_customer_id(&self.pool, tenant_id, source_customer_id).await?)
    }

    async fn upsert_order(
        &self,
        tenant_id: &str,
        customer_id: Option<i64>,
        order: &NormalizedOrder,
    ) -> Result<i64, StoreError> {
        Ok(shopdash_db::upsert_order(&self.pool, tenant_id, customer_id, order).await?)
    }
}

#[async_trait]
impl AnalyticsStore for PgStore {
    async fn dashboard_totals(&self, tenant_id: &str) -> Result<DashboardTotals, StoreError> {
        let (customers, products, orders) = tokio::try_join!(
            shopdash_db::count_customers(&self.pool, tenant_id),
            shopdash_db::count_products(&self.pool, tenant_id),
            shopdash_db::order_totals(&self.pool, tenant_id),
        )?;

        Ok(DashboardTotals {
            customers,
            products,
            orders: orders.order_count,
            revenue: orders.total_revenue,
        })
    }

    async fn orders_by_day(
        &self,
        tenant_id: &str,
        range: DateRange,
        limit: usize,
    ) -> Result<Vec<DayBucket>, StoreError> {
        let rows = shopdash_db::list_orders_by_day(
            &self.pool,
            tenant_id,
            range.start,
            range.end,
            to_i64(limit),
        )
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| DayBucket {
                day: row.day,
                orders: row.order_count,
                revenue: row.revenue,
            })
            .collect())
    }

    async fn sales_by_month(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<SalesBucket>, StoreError> {
        let rows = shopdash_db::list_sales_by_month(&self.pool, tenant_id, to_i64(limit)).await?;
        Ok(rows
            .into_iter()
            .map(|row| SalesBucket {
                month: row.month,
                orders: row.order_count,
                gross: row.gross_revenue,
                discounts: row.discounts,
            })
            .collect())
    }

    async fn cohorts_by_month(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<CohortBucket>, StoreError> {
        let rows =
            shopdash_db::list_customer_cohorts(&self.pool, tenant_id, to_i64(limit)).await?;
        Ok(rows
            .into_iter()
            .map(|row| CohortBucket {
                month: row.month,
                customers: row.customer_count,
                returning: row.returning_count,
                total_spent: row.total_spent,
            })
            .collect())
    }

    async fn top_customers(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<CustomerSummary>, StoreError> {
        let rows = shopdash_db::list_top_customers(&self.pool, tenant_id, to_i64(limit)).await?;
        Ok(rows.into_iter().map(CustomerSummary::from).collect())
    }

    async fn search_customers(
        &self,
        tenant_id: &str,
        search: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<CustomerPage, StoreError> {
        let page = shopdash_db::search_customers(
            &self.pool,
            tenant_id,
            search,
            to_i64(limit),
            to_i64(offset),
        )
        .await?;

        Ok(CustomerPage {
            customers: page.rows.into_iter().map(CustomerSummary::from).collect(),
            total: u64::try_from(page.total).unwrap_or(0),
        })
    }
}
