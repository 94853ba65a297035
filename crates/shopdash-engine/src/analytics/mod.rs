//! Read-only reports over the synced store.
//!
//! Every operation is scoped to one tenant. A missing or inactive tenant is
//! reported as an [`AnalyticsError`]; any failure while querying is logged
//! and answered with an empty or zeroed report so a dashboard always
//! renders.

pub mod grouping;
pub mod report;

use std::sync::Arc;

use rust_decimal::Decimal;
use shopdash_core::TenantConfig;
use shopdash_shopify::{parse_amount, ShopifyClient};

use crate::error::AnalyticsError;
use crate::store::{AnalyticsStore, CustomerSummary, DateRange, StoreError, TenantRegistry};
use grouping::{MAX_DAYS, MAX_MONTHS};
use report::{
    CartAbandonmentSummary, CustomerList, CustomerListEntry, DailyOrders, DashboardStats,
    MonthlyCohort, MonthlySales, Pagination, Report, ReportCache, TopCustomer,
};

pub const DEFAULT_TOP_CUSTOMERS: usize = 5;
pub const MAX_LIST_LIMIT: u32 = 100;
const NO_NAME: &str = "No Name";

/// Paging and filtering for [`Aggregator::customer_list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerQuery {
    /// 1-based; values below 1 are treated as 1.
    pub page: u32,
    /// Clamped to `1..=100`.
    pub limit: u32,
    pub search: Option<String>,
}

impl Default for CustomerQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            search: None,
        }
    }
}

pub struct Aggregator {
    registry: Arc<dyn TenantRegistry>,
    store: Arc<dyn AnalyticsStore>,
    client: Arc<ShopifyClient>,
    cache: Arc<ReportCache>,
}

impl Aggregator {
    #[must_use]
    pub fn new(
        registry: Arc<dyn TenantRegistry>,
        store: Arc<dyn AnalyticsStore>,
        client: Arc<ShopifyClient>,
        cache: Arc<ReportCache>,
    ) -> Self {
        Self {
            registry,
            store,
            client,
            cache,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ReportCache> {
        &self.cache
    }

    /// Counts and revenue. Cached under `dashboard-<tenant>`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the tenant is unknown or inactive.
    pub async fn dashboard_stats(&self, tenant_id: &str) -> Result<DashboardStats, AnalyticsError> {
        if self.check_tenant(tenant_id).await?.is_none() {
            return Ok(DashboardStats::default());
        }

        let key = format!("dashboard-{tenant_id}");
        if let Some(Report::Dashboard(stats)) = self.cache.get(&key) {
            tracing::debug!(tenant_id, key = %key, "cache hit");
            return Ok(stats);
        }

        let generation = self.cache.generation();
        match self.store.dashboard_totals(tenant_id).await {
            Ok(totals) => {
                let stats = DashboardStats {
                    total_customers: totals.customers,
                    total_products: totals.products,
                    total_orders: totals.orders,
                    total_revenue: totals.revenue,
                };
                self.fill(&key, Report::Dashboard(stats), generation);
                Ok(stats)
            }
            Err(e) => Ok(degraded(tenant_id, "dashboard", &e)),
        }
    }

    /// Orders per UTC day within `range`, newest first, at most 30 days.
    /// An inverted range yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the tenant is unknown or inactive.
    pub async fn orders_by_date(
        &self,
        tenant_id: &str,
        range: DateRange,
    ) -> Result<Vec<DailyOrders>, AnalyticsError> {
        if self.check_tenant(tenant_id).await?.is_none() || range.is_inverted() {
            return Ok(Vec::new());
        }

        match self.store.orders_by_day(tenant_id, range, MAX_DAYS).await {
            Ok(days) => Ok(days.into_iter().map(grouping::daily_orders).collect()),
            Err(e) => Ok(degraded(tenant_id, "orders-by-date", &e)),
        }
    }

    /// The `limit` highest spenders.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the tenant is unknown or inactive.
    pub async fn top_customers(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<TopCustomer>, AnalyticsError> {
        if self.check_tenant(tenant_id).await?.is_none() || limit == 0 {
            return Ok(Vec::new());
        }

        match self.store.top_customers(tenant_id, limit).await {
            Ok(customers) => Ok(customers
                .into_iter()
                .take(limit)
                .map(|c| TopCustomer {
                    name: grouping::display_name(&c.first_name, &c.last_name)
                        .unwrap_or_else(|| c.email.clone()),
                    id: c.source_customer_id,
                    email: c.email,
                    total_spent: c.total_spent,
                    orders_count: c.orders_count,
                })
                .collect()),
            Err(e) => Ok(degraded(tenant_id, "top-customers", &e)),
        }
    }

    /// Monthly gross, discount and net revenue, newest first, at most 12
    /// months. Cached under `sales-performance-<tenant>`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the tenant is unknown or inactive.
    pub async fn sales_performance(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<MonthlySales>, AnalyticsError> {
        if self.check_tenant(tenant_id).await?.is_none() {
            return Ok(Vec::new());
        }

        let key = format!("sales-performance-{tenant_id}");
        if let Some(Report::SalesPerformance(months)) = self.cache.get(&key) {
            tracing::debug!(tenant_id, key = %key, "cache hit");
            return Ok(months);
        }

        let generation = self.cache.generation();
        match self.store.sales_by_month(tenant_id, MAX_MONTHS).await {
            Ok(buckets) => {
                let months: Vec<MonthlySales> =
                    buckets.into_iter().map(grouping::monthly_sales).collect();
                self.fill(&key, Report::SalesPerformance(months.clone()), generation);
                Ok(months)
            }
            Err(e) => Ok(degraded(tenant_id, "sales-performance", &e)),
        }
    }

    /// Signup cohorts per month, newest first, at most 12 months. Cached
    /// under `customer-behavior-<tenant>`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the tenant is unknown or inactive.
    pub async fn customer_behavior(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<MonthlyCohort>, AnalyticsError> {
        if self.check_tenant(tenant_id).await?.is_none() {
            return Ok(Vec::new());
        }

        let key = format!("customer-behavior-{tenant_id}");
        if let Some(Report::CustomerBehavior(cohorts)) = self.cache.get(&key) {
            tracing::debug!(tenant_id, key = %key, "cache hit");
            return Ok(cohorts);
        }

        let generation = self.cache.generation();
        match self.store.cohorts_by_month(tenant_id, MAX_MONTHS).await {
            Ok(buckets) => {
                let cohorts: Vec<MonthlyCohort> =
                    buckets.into_iter().map(grouping::monthly_cohort).collect();
                self.fill(&key, Report::CustomerBehavior(cohorts.clone()), generation);
                Ok(cohorts)
            }
            Err(e) => Ok(degraded(tenant_id, "customer-behavior", &e)),
        }
    }

    /// Abandoned checkouts against all orders, read live from Shopify rather
    /// than the store. Any source failure yields a zeroed summary.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the tenant is unknown or inactive.
    pub async fn cart_abandonment(
        &self,
        tenant_id: &str,
    ) -> Result<CartAbandonmentSummary, AnalyticsError> {
        let Some(tenant) = self.check_tenant(tenant_id).await? else {
            return Ok(CartAbandonmentSummary::default());
        };
        if !tenant.has_credentials() {
            tracing::warn!(tenant_id, "cart abandonment skipped: no shop credentials");
            return Ok(CartAbandonmentSummary::default());
        }

        let fetched = tokio::try_join!(
            self.client.abandoned_checkouts(&tenant),
            self.client.count_orders(&tenant),
        );
        let (checkouts, completed) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(
                    tenant_id,
                    error = %e,
                    transient = e.is_transient(),
                    "cart abandonment unavailable; returning zeroed summary"
                );
                return Ok(CartAbandonmentSummary::default());
            }
        };

        let abandoned = u64::try_from(checkouts.len()).unwrap_or(u64::MAX);
        let abandoned_value: Decimal = checkouts
            .iter()
            .map(|checkout| {
                parse_amount("total_price", checkout.total_price.as_ref()).unwrap_or_else(|e| {
                    tracing::warn!(tenant_id, error = %e, "ignoring checkout total");
                    Decimal::ZERO
                })
            })
            .sum();

        Ok(CartAbandonmentSummary {
            total_abandoned: abandoned,
            total_completed: completed,
            total_started: abandoned.saturating_add(completed),
            abandonment_rate: grouping::abandonment_rate(abandoned, completed),
            abandoned_value: grouping::round_cents(abandoned_value),
        })
    }

    /// Paged customer listing, highest spenders first, with optional search.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the tenant is unknown or inactive.
    pub async fn customer_list(
        &self,
        tenant_id: &str,
        query: &CustomerQuery,
    ) -> Result<CustomerList, AnalyticsError> {
        let page = query.page.max(1);
        let limit = query.limit.clamp(1, MAX_LIST_LIMIT);
        let empty = CustomerList {
            customers: Vec::new(),
            pagination: Pagination::new(page, limit, 0),
        };

        if self.check_tenant(tenant_id).await?.is_none() {
            return Ok(empty);
        }

        let page_len = usize::try_from(limit).unwrap_or(usize::MAX);
        let offset = usize::try_from(page - 1)
            .unwrap_or(usize::MAX)
            .saturating_mul(page_len);
        match self
            .store
            .search_customers(tenant_id, query.search.as_deref(), page_len, offset)
            .await
        {
            Ok(found) => Ok(CustomerList {
                customers: found.customers.into_iter().map(list_entry).collect(),
                pagination: Pagination::new(page, limit, found.total),
            }),
            Err(e) => {
                tracing::warn!(tenant_id, error = %e, "customer list query failed");
                Ok(empty)
            }
        }
    }

    /// Caches a freshly computed report unless the cache was cleared while
    /// it was being computed.
    fn fill(&self, key: &str, report: Report, generation: u64) {
        if !self.cache.set_if_generation(key, report, generation) {
            tracing::debug!(key = %key, "cache cleared during query; result not cached");
        }
    }

    /// `Ok(Some)` for an active tenant, `Ok(None)` when the registry itself
    /// failed and the caller should degrade to an empty report.
    async fn check_tenant(&self, tenant_id: &str) -> Result<Option<TenantConfig>, AnalyticsError> {
        match self.registry.find(tenant_id).await {
            Ok(Some(tenant)) if tenant.is_active => Ok(Some(tenant)),
            Ok(Some(_)) => Err(AnalyticsError::TenantInactive(tenant_id.to_owned())),
            Ok(None) => Err(AnalyticsError::TenantNotFound(tenant_id.to_owned())),
            Err(e) => {
                tracing::warn!(tenant_id, error = %e, "tenant lookup failed");
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

fn degraded<T: Default>(tenant_id: &str, report: &'static str, err: &StoreError) -> T {
    tracing::warn!(tenant_id, report, error = %err, "report query failed; returning empty result");
    T::default()
}

fn list_entry(customer: CustomerSummary) -> CustomerListEntry {
    CustomerListEntry {
        name: grouping::display_name(&customer.first_name, &customer.last_name)
            .unwrap_or_else(|| NO_NAME.to_owned()),
        id: customer.source_customer_id,
        email: customer.email,
        total_spent: customer.total_spent,
        orders_count: customer.orders_count,
        created_at: customer.created_at,
    }
}
