//! Storage seams used by the sync engine and the aggregator.
//!
//! Every method takes the tenant id and must scope reads and writes to it.
//! [`PgStore`] is the production adapter; [`MemoryStore`] backs tests and
//! local experiments.

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shopdash_core::{NormalizedCustomer, NormalizedOrder, NormalizedProduct, TenantConfig};
use shopdash_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tenant {0} not found")]
    TenantNotFound(String),

    /// A write the store refused, such as a row for a tenant that does not exist.
    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Source of tenant configuration. Reads always hit the backing store so a
/// credential change is visible on the next call.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    async fn find(&self, tenant_id: &str) -> Result<Option<TenantConfig>, StoreError>;

    /// Like [`Self::find`] but a missing tenant is an error.
    async fn resolve(&self, tenant_id: &str) -> Result<TenantConfig, StoreError> {
        self.find(tenant_id)
            .await?
            .ok_or_else(|| StoreError::TenantNotFound(tenant_id.to_owned()))
    }

    /// Returns the existing tenant or registers a new, active one with no
    /// credentials. Never modifies an existing tenant.
    async fn ensure(&self, tenant_id: &str) -> Result<TenantConfig, StoreError>;

    async fn update_credentials(
        &self,
        tenant_id: &str,
        shop_domain: &str,
        access_token: &str,
    ) -> Result<TenantConfig, StoreError>;

    async fn set_active(&self, tenant_id: &str, is_active: bool)
        -> Result<TenantConfig, StoreError>;

    async fn list_active(&self) -> Result<Vec<TenantConfig>, StoreError>;
}

/// Upserts keyed by `(tenant_id, source id)`. Each returns the internal row id.
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn upsert_customer(
        &self,
        tenant_id: &str,
        customer: &NormalizedCustomer,
    ) -> Result<i64, StoreError>;

    async fn upsert_product(
        &self,
        tenant_id: &str,
        product: &NormalizedProduct,
    ) -> Result<i64, StoreError>;

    async fn find_customer_id(
        &self,
        tenant_id: &str,
        source_customer_id: &str,
    ) -> Result<Option<i64>, StoreError>;

    async fn upsert_order(
        &self,
        tenant_id: &str,
        customer_id: Option<i64>,
        order: &NormalizedOrder,
    ) -> Result<i64, StoreError>;
}

/// Read-only queries behind the reports.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn dashboard_totals(&self, tenant_id: &str) -> Result<DashboardTotals, StoreError>;

    /// Order count and revenue per UTC day in `range`, newest day first, at
    /// most `limit` days.
    async fn orders_by_day(
        &self,
        tenant_id: &str,
        range: DateRange,
        limit: usize,
    ) -> Result<Vec<DayBucket>, StoreError>;

    /// Order count, gross revenue and discounts per UTC month, newest month
    /// first, at most `limit` months.
    async fn sales_by_month(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<SalesBucket>, StoreError>;

    /// Customers grouped by the UTC month they signed up in, newest month
    /// first, at most `limit` months.
    async fn cohorts_by_month(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<CohortBucket>, StoreError>;

    /// Highest `total_spent` first; ties keep insertion order.
    async fn top_customers(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<CustomerSummary>, StoreError>;

    /// Same ordering as [`Self::top_customers`], filtered by a case-insensitive
    /// substring of email, first name or last name.
    async fn search_customers(
        &self,
        tenant_id: &str,
        search: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<CustomerPage, StoreError>;
}

/// Inclusive range of UTC calendar days. A missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    #[must_use]
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// A range no day falls in, for filters that could not be read.
    #[must_use]
    pub fn nothing() -> Self {
        Self {
            start: Some(NaiveDate::MAX),
            end: Some(NaiveDate::MIN),
        }
    }

    /// `start > end`: nothing can match.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start > end)
    }

    #[must_use]
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start.is_none_or(|start| day >= start) && self.end.is_none_or(|end| day <= end)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardTotals {
    pub customers: i64,
    pub products: i64,
    pub orders: i64,
    pub revenue: Decimal,
}

/// Orders placed on one UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBucket {
    pub day: NaiveDate,
    pub orders: i64,
    pub revenue: Decimal,
}

/// Orders placed in one UTC month. `month` is the first day of the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalesBucket {
    pub month: NaiveDate,
    pub orders: i64,
    pub gross: Decimal,
    pub discounts: Decimal,
}

/// Customers created in one UTC month. `month` is the first day of the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortBucket {
    pub month: NaiveDate,
    pub customers: i64,
    /// Customers with more than one order.
    pub returning: i64,
    pub total_spent: Decimal,
}

/// One order as seen by the in-memory grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFact {
    pub total_price: Decimal,
    pub total_discounts: Decimal,
    pub created_at: DateTime<Utc>,
}

/// One customer as seen by the in-memory grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerFact {
    pub total_spent: Decimal,
    pub orders_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerSummary {
    pub source_customer_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub total_spent: Decimal,
    pub orders_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerPage {
    pub customers: Vec<CustomerSummary>,
    /// Matches across all pages.
    pub total: u64,
}
