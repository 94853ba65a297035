//! Aggregator tests over `MemoryStore`, with `wiremock` for the live
//! cart-abandonment path.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tokio::sync::Notify;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shopdash_core::{
    FinancialStatus, ManualClock, NormalizedCustomer, NormalizedOrder, NormalizedProduct,
    TenantConfig,
};
use shopdash_engine::store::{
    CohortBucket, CustomerPage, CustomerSummary, DashboardTotals, DayBucket, SalesBucket,
};
use shopdash_engine::{
    Aggregator, AnalyticsError, AnalyticsStore, CustomerQuery, DashboardStats, DateRange,
    MemoryStore, ReportCache, StoreError, SyncStore, TenantRegistry,
};
use shopdash_shopify::ShopifyClient;

const API: &str = "/admin/api/2024-01";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

fn dec(raw: &str) -> Decimal {
    Decimal::from_str(raw).expect("valid decimal")
}

fn day(raw: &str) -> NaiveDate {
    NaiveDate::from_str(raw).expect("valid date")
}

fn tenant(id: &str, shop_domain: &str) -> TenantConfig {
    TenantConfig {
        id: id.to_owned(),
        shop_domain: shop_domain.to_owned(),
        access_token: "shpat_test".to_owned(),
        is_active: true,
        settings: json!({}),
    }
}

fn client() -> Arc<ShopifyClient> {
    Arc::new(ShopifyClient::new(5, "shopdash-test/0.1", "2024-01", 10).expect("test client"))
}

fn aggregator_with_cache(store: &Arc<MemoryStore>, cache: Arc<ReportCache>) -> Aggregator {
    Aggregator::new(store.clone(), store.clone(), client(), cache)
}

fn aggregator(store: &Arc<MemoryStore>) -> Aggregator {
    aggregator_with_cache(store, Arc::new(ReportCache::new(Duration::from_secs(300))))
}

fn store_with_tenant() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert_tenant(tenant("1", "acme.myshopify.com"));
    store
}

fn customer(id: &str, first: &str, last: &str, spent: &str, orders: i32, when: &str) -> NormalizedCustomer {
    NormalizedCustomer {
        source_customer_id: id.to_owned(),
        email: format!("{id}@example.com"),
        first_name: first.to_owned(),
        last_name: last.to_owned(),
        total_spent: dec(spent),
        orders_count: orders,
        created_at: at(when),
    }
}

fn order(id: &str, total: &str, discounts: &str, when: &str) -> NormalizedOrder {
    NormalizedOrder {
        source_order_id: id.to_owned(),
        source_customer_id: None,
        total_price: dec(total),
        total_discounts: dec(discounts),
        financial_status: FinancialStatus::Paid,
        fulfillment_status: String::new(),
        created_at: at(when),
    }
}

async fn seed_orders(store: &MemoryStore, tenant_id: &str, orders: &[NormalizedOrder]) {
    for o in orders {
        store
            .upsert_order(tenant_id, None, o)
            .await
            .expect("seed order");
    }
}

async fn seed_customers(store: &MemoryStore, tenant_id: &str, customers: &[NormalizedCustomer]) {
    for c in customers {
        store
            .upsert_customer(tenant_id, c)
            .await
            .expect("seed customer");
    }
}

/// Analytics store whose every query fails.
struct BrokenStore;

#[async_trait]
impl AnalyticsStore for BrokenStore {
    async fn dashboard_totals(&self, _: &str) -> Result<DashboardTotals, StoreError> {
        Err(StoreError::Backend("connection reset".to_owned()))
    }

    async fn orders_by_day(
        &self,
        _: &str,
        _: DateRange,
        _: usize,
    ) -> Result<Vec<DayBucket>, StoreError> {
        Err(StoreError::Backend("connection reset".to_owned()))
    }

    async fn sales_by_month(&self, _: &str, _: usize) -> Result<Vec<SalesBucket>, StoreError> {
        Err(StoreError::Backend("connection reset".to_owned()))
    }

    async fn cohorts_by_month(&self, _: &str, _: usize) -> Result<Vec<CohortBucket>, StoreError> {
        Err(StoreError::Backend("connection reset".to_owned()))
    }

    async fn top_customers(&self, _: &str, _: usize) -> Result<Vec<CustomerSummary>, StoreError> {
        Err(StoreError::Backend("connection reset".to_owned()))
    }

    async fn search_customers(
        &self,
        _: &str,
        _: Option<&str>,
        _: usize,
        _: usize,
    ) -> Result<CustomerPage, StoreError> {
        Err(StoreError::Backend("connection reset".to_owned()))
    }
}

/// Reads dashboard totals from the inner store, then holds the answer until
/// released. Every other query goes straight through.
struct SlowDashboardStore {
    inner: Arc<MemoryStore>,
    read_done: Notify,
    release: Notify,
}

impl SlowDashboardStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            read_done: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl AnalyticsStore for SlowDashboardStore {
    async fn dashboard_totals(&self, tenant_id: &str) -> Result<DashboardTotals, StoreError> {
        let totals = self.inner.dashboard_totals(tenant_id).await;
        self.read_done.notify_one();
        self.release.notified().await;
        totals
    }

    async fn orders_by_day(
        &self,
        tenant_id: &str,
        range: DateRange,
        limit: usize,
    ) -> Result<Vec<DayBucket>, StoreError> {
        self.inner.orders_by_day(tenant_id, range, limit).await
    }

    async fn sales_by_month(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<SalesBucket>, StoreError> {
        self.inner.sales_by_month(tenant_id, limit).await
    }

    async fn cohorts_by_month(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<CohortBucket>, StoreError> {
        self.inner.cohorts_by_month(tenant_id, limit).await
    }

    async fn top_customers(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<CustomerSummary>, StoreError> {
        self.inner.top_customers(tenant_id, limit).await
    }

    async fn search_customers(
        &self,
        tenant_id: &str,
        search: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<CustomerPage, StoreError> {
        self.inner
            .search_customers(tenant_id, search, limit, offset)
            .await
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dashboard_on_empty_tenant_is_all_zero() {
    let store = store_with_tenant();
    let stats = aggregator(&store)
        .dashboard_stats("1")
        .await
        .expect("known tenant");

    assert_eq!(stats, DashboardStats::default());
    assert_eq!(stats.total_revenue, Decimal::ZERO);
}

#[tokio::test]
async fn dashboard_counts_and_sums_only_this_tenant() {
    let store = store_with_tenant();
    store.insert_tenant(tenant("2", "other.myshopify.com"));
    seed_customers(&store, "1", &[customer("c1", "Ada", "L", "1", 1, "2024-01-01T00:00:00Z")]).await;
    store
        .upsert_product(
            "1",
            &NormalizedProduct {
                source_product_id: "p1".to_owned(),
                title: "Seltzer".to_owned(),
                vendor: String::new(),
                product_type: String::new(),
                price: dec("4.99"),
                inventory: 1,
                status: "active".to_owned(),
                created_at: at("2024-01-01T00:00:00Z"),
            },
        )
        .await
        .expect("product");
    seed_orders(
        &store,
        "1",
        &[
            order("o1", "10.00", "0", "2024-01-01T00:00:00Z"),
            order("o2", "5.50", "0", "2024-01-02T00:00:00Z"),
        ],
    )
    .await;
    seed_orders(&store, "2", &[order("o1", "999", "0", "2024-01-01T00:00:00Z")]).await;

    let stats = aggregator(&store).dashboard_stats("1").await.expect("stats");

    assert_eq!(stats.total_customers, 1);
    assert_eq!(stats.total_products, 1);
    assert_eq!(stats.total_orders, 2);
    assert_eq!(stats.total_revenue, dec("15.50"));
}

#[tokio::test]
async fn dashboard_is_cached_until_cleared() {
    let store = store_with_tenant();
    let agg = aggregator(&store);

    let before = agg.dashboard_stats("1").await.expect("stats");
    seed_orders(&store, "1", &[order("o1", "10", "0", "2024-01-01T00:00:00Z")]).await;

    let cached = agg.dashboard_stats("1").await.expect("stats");
    assert_eq!(cached, before, "served from cache");

    agg.cache().clear();
    let fresh = agg.dashboard_stats("1").await.expect("stats");
    assert_eq!(fresh.total_orders, 1);
}

#[tokio::test]
async fn report_read_before_a_clear_is_not_cached_after_it() {
    let store = store_with_tenant();
    let slow = Arc::new(SlowDashboardStore::new(store.clone()));
    let cache = Arc::new(ReportCache::new(Duration::from_secs(300)));
    let agg = Arc::new(Aggregator::new(
        store.clone(),
        slow.clone(),
        client(),
        cache.clone(),
    ));

    let pending = tokio::spawn({
        let agg = agg.clone();
        async move { agg.dashboard_stats("1").await }
    });
    slow.read_done.notified().await;

    // A sync lands while the query result is still in flight.
    seed_orders(&store, "1", &[order("o1", "10", "0", "2024-01-01T00:00:00Z")]).await;
    cache.clear();
    slow.release.notify_one();

    let in_flight = pending.await.expect("task joins").expect("stats");
    assert_eq!(in_flight.total_orders, 0);
    assert!(cache.is_empty(), "pre-clear totals must not be cached");

    let next = aggregator_with_cache(&store, cache.clone())
        .dashboard_stats("1")
        .await
        .expect("stats");
    assert_eq!(next.total_orders, 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn cached_dashboard_expires_with_the_clock() {
    let store = store_with_tenant();
    let clock = ManualClock::default();
    let cache = Arc::new(ReportCache::with_clock(
        Duration::from_secs(300),
        Arc::new(clock.clone()),
    ));
    let agg = aggregator_with_cache(&store, cache.clone());

    agg.dashboard_stats("1").await.expect("stats");
    seed_orders(&store, "1", &[order("o1", "10", "0", "2024-01-01T00:00:00Z")]).await;

    clock.advance(Duration::from_secs(301));
    let fresh = agg.dashboard_stats("1").await.expect("stats");
    assert_eq!(fresh.total_orders, 1);
}

// ---------------------------------------------------------------------------
// Orders by date
// ---------------------------------------------------------------------------

#[tokio::test]
async fn orders_by_date_groups_per_day_newest_first() {
    let store = store_with_tenant();
    seed_orders(
        &store,
        "1",
        &[
            order("o1", "10", "0", "2024-01-01T08:00:00Z"),
            order("o2", "5", "0", "2024-01-01T20:00:00Z"),
            order("o3", "20", "0", "2024-01-02T12:00:00Z"),
        ],
    )
    .await;

    let days = aggregator(&store)
        .orders_by_date("1", DateRange::default())
        .await
        .expect("report");

    let json = serde_json::to_value(&days).expect("serializes");
    assert_eq!(
        json,
        json!([
            { "date": "2024-01-02", "orderCount": 1, "totalRevenue": 20.0 },
            { "date": "2024-01-01", "orderCount": 2, "totalRevenue": 15.0 }
        ])
    );
}

#[tokio::test]
async fn orders_by_date_honours_inclusive_range() {
    let store = store_with_tenant();
    seed_orders(
        &store,
        "1",
        &[
            order("o1", "1", "0", "2024-01-01T00:00:00Z"),
            order("o2", "1", "0", "2024-01-02T23:59:59Z"),
            order("o3", "1", "0", "2024-01-03T00:00:00Z"),
        ],
    )
    .await;

    let range = DateRange::new(Some(day("2024-01-02")), Some(day("2024-01-02")));
    let days = aggregator(&store)
        .orders_by_date("1", range)
        .await
        .expect("report");

    assert_eq!(days.len(), 1);
    assert_eq!(days[0].date, day("2024-01-02"));
}

#[tokio::test]
async fn inverted_range_is_empty_not_an_error() {
    let store = store_with_tenant();
    seed_orders(&store, "1", &[order("o1", "1", "0", "2024-01-01T00:00:00Z")]).await;

    let range = DateRange::new(Some(day("2024-02-01")), Some(day("2024-01-01")));
    let days = aggregator(&store)
        .orders_by_date("1", range)
        .await
        .expect("report");

    assert!(days.is_empty());
}

// ---------------------------------------------------------------------------
// Top customers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn top_customers_sorted_desc_with_stable_ties_and_name_fallback() {
    let store = store_with_tenant();
    seed_customers(
        &store,
        "1",
        &[
            customer("c1", "Ada", "Lovelace", "50", 2, "2024-01-01T00:00:00Z"),
            customer("c2", "", "", "80", 1, "2024-01-01T00:00:00Z"),
            customer("c3", "Tie", "First", "50", 1, "2024-01-01T00:00:00Z"),
            customer("c4", "Low", "", "1", 1, "2024-01-01T00:00:00Z"),
            customer("c5", "Mid", "", "20", 1, "2024-01-01T00:00:00Z"),
            customer("c6", "Mid", "Two", "10", 1, "2024-01-01T00:00:00Z"),
        ],
    )
    .await;

    let top = aggregator(&store)
        .top_customers("1", 5)
        .await
        .expect("report");

    let ids: Vec<&str> = top.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c2", "c1", "c3", "c5", "c6"]);
    assert_eq!(top[0].name, "c2@example.com", "blank names fall back to email");
    assert_eq!(top[1].name, "Ada Lovelace");
    assert_eq!(top[3].name, "Mid");
}

// ---------------------------------------------------------------------------
// Monthly reports
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sales_performance_and_customer_behavior() {
    let store = store_with_tenant();
    seed_orders(
        &store,
        "1",
        &[
            order("o1", "100", "10", "2024-02-01T00:00:00Z"),
            order("o2", "40", "0", "2024-01-05T00:00:00Z"),
        ],
    )
    .await;
    seed_customers(
        &store,
        "1",
        &[
            customer("c1", "A", "", "100", 2, "2024-02-01T00:00:00Z"),
            customer("c2", "B", "", "40", 1, "2024-02-10T00:00:00Z"),
        ],
    )
    .await;
    let agg = aggregator(&store);

    let sales = agg.sales_performance("1").await.expect("sales");
    assert_eq!(sales.len(), 2);
    assert_eq!(sales[0].month, "2024-02");
    assert_eq!(sales[0].net_revenue, dec("90"));

    let cohorts = agg.customer_behavior("1").await.expect("behavior");
    assert_eq!(cohorts.len(), 1);
    assert_eq!(cohorts[0].new_customers, 2);
    assert_eq!(cohorts[0].returning_customers, 1);
    assert_eq!(cohorts[0].lifetime_value, dec("70"));

    assert_eq!(agg.cache().len(), 2, "both monthly reports are cached");
}

#[tokio::test]
async fn resynced_records_keep_their_first_created_at() {
    let store = store_with_tenant();
    seed_orders(&store, "1", &[order("o1", "10", "0", "2024-01-15T00:00:00Z")]).await;
    seed_customers(
        &store,
        "1",
        &[customer("c1", "Ada", "", "10", 1, "2024-01-15T00:00:00Z")],
    )
    .await;

    // The second pass reports later timestamps and a new total.
    seed_orders(&store, "1", &[order("o1", "12", "0", "2024-03-01T00:00:00Z")]).await;
    seed_customers(
        &store,
        "1",
        &[customer("c1", "Ada", "", "12", 2, "2024-03-01T00:00:00Z")],
    )
    .await;

    let kept = store.customer("1", "c1").expect("customer stored");
    assert_eq!(kept.created_at, at("2024-01-15T00:00:00Z"));
    assert_eq!(kept.total_spent, dec("12"));

    let agg = aggregator(&store);
    let days = agg
        .orders_by_date("1", DateRange::default())
        .await
        .expect("days");
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].date, day("2024-01-15"));
    assert_eq!(days[0].total_revenue, dec("12"));

    let cohorts = agg.customer_behavior("1").await.expect("behavior");
    assert_eq!(cohorts[0].month, "2024-01");
    assert_eq!(cohorts[0].returning_customers, 1);
}

// ---------------------------------------------------------------------------
// Tenant checks and degradation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_and_inactive_tenants_are_errors() {
    let store = store_with_tenant();
    store.insert_tenant(TenantConfig {
        is_active: false,
        ..tenant("off", "off.myshopify.com")
    });
    let agg = aggregator(&store);

    assert_eq!(
        agg.dashboard_stats("missing").await.unwrap_err(),
        AnalyticsError::TenantNotFound("missing".to_owned())
    );
    assert_eq!(
        agg.top_customers("off", 5).await.unwrap_err(),
        AnalyticsError::TenantInactive("off".to_owned())
    );
}

#[tokio::test]
async fn query_failures_degrade_to_empty_reports() {
    let registry = store_with_tenant();
    let cache = Arc::new(ReportCache::new(Duration::from_secs(300)));
    let agg = Aggregator::new(registry, Arc::new(BrokenStore), client(), cache.clone());

    assert_eq!(
        agg.dashboard_stats("1").await.expect("degrades"),
        DashboardStats::default()
    );
    assert!(agg
        .orders_by_date("1", DateRange::default())
        .await
        .expect("degrades")
        .is_empty());
    assert!(agg.top_customers("1", 5).await.expect("degrades").is_empty());
    assert!(agg.sales_performance("1").await.expect("degrades").is_empty());
    assert!(agg.customer_behavior("1").await.expect("degrades").is_empty());
    let list = agg
        .customer_list("1", &CustomerQuery::default())
        .await
        .expect("degrades");
    assert!(list.customers.is_empty());
    assert!(cache.is_empty(), "degraded results are not cached");
}

// ---------------------------------------------------------------------------
// Customer list
// ---------------------------------------------------------------------------

#[tokio::test]
async fn customer_list_searches_pages_and_names() {
    let store = store_with_tenant();
    seed_customers(
        &store,
        "1",
        &[
            customer("c1", "Ada", "Lovelace", "30", 1, "2024-01-01T00:00:00Z"),
            customer("c2", "", "", "20", 1, "2024-01-01T00:00:00Z"),
            customer("c3", "Adaline", "", "10", 1, "2024-01-01T00:00:00Z"),
        ],
    )
    .await;
    let agg = aggregator(&store);

    let all = agg
        .customer_list(
            "1",
            &CustomerQuery {
                page: 1,
                limit: 2,
                search: None,
            },
        )
        .await
        .expect("list");
    assert_eq!(all.customers.len(), 2);
    assert_eq!(all.customers[1].name, "No Name");
    assert_eq!(all.pagination.total, 3);
    assert_eq!(all.pagination.total_pages, 2);
    assert!(all.pagination.has_next);

    let found = agg
        .customer_list(
            "1",
            &CustomerQuery {
                page: 0,
                limit: 500,
                search: Some("ADA".to_owned()),
            },
        )
        .await
        .expect("search");
    assert_eq!(found.customers.len(), 2);
    assert_eq!(found.pagination.page, 1);
    assert_eq!(found.pagination.limit, 100);
}

// ---------------------------------------------------------------------------
// Cart abandonment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cart_abandonment_reads_live_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/checkouts.json")))
        .and(query_param("status", "abandoned"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "checkouts": [{ "id": 1, "total_price": "40.00" }, { "id": 2, "total_price": "10.25" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/orders/count.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 4 })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    store.insert_tenant(tenant("1", &server.uri()));

    let summary = aggregator(&store)
        .cart_abandonment("1")
        .await
        .expect("summary");

    assert_eq!(summary.total_abandoned, 2);
    assert_eq!(summary.total_completed, 4);
    assert_eq!(summary.total_started, 6);
    assert_eq!(summary.abandonment_rate, dec("33.33"));
    assert_eq!(summary.abandoned_value, dec("50.25"));
}

#[tokio::test]
async fn cart_abandonment_zeroes_on_source_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    store.insert_tenant(tenant("1", &server.uri()));

    let summary = aggregator(&store)
        .cart_abandonment("1")
        .await
        .expect("degrades instead of failing");

    assert_eq!(summary.total_started, 0);
    assert_eq!(summary.abandonment_rate, Decimal::ZERO);
}

#[tokio::test]
async fn cart_abandonment_without_credentials_is_zeroed() {
    let store = Arc::new(MemoryStore::new());
    store.ensure("1").await.expect("ensure");

    let summary = aggregator(&store)
        .cart_abandonment("1")
        .await
        .expect("summary");

    assert_eq!(summary.total_abandoned, 0);
}
