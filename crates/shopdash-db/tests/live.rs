//! Live integration tests for shopdash-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/shopdash-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory. Run with `DATABASE_URL` set and `--ignored`.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shopdash_core::{FinancialStatus, NormalizedCustomer, NormalizedOrder, NormalizedProduct};
use shopdash_db::{
    count_customers, count_products, ensure_tenant, find_customer_id, get_tenant,
    list_active_tenants, list_customer_cohorts, list_orders_by_day, list_sales_by_month,
    list_top_customers, order_totals,
    search_customers, set_tenant_active, update_tenant_credentials, upsert_customer,
    upsert_order, upsert_product, DbError,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

fn dec(raw: &str) -> Decimal {
    Decimal::from_str(raw).expect("valid decimal")
}

fn customer(source_id: &str, first: &str, spent: &str) -> NormalizedCustomer {
    NormalizedCustomer {
        source_customer_id: source_id.to_string(),
        email: format!("{first}@example.com").to_lowercase(),
        first_name: first.to_string(),
        last_name: "Tester".to_string(),
        total_spent: dec(spent),
        orders_count: 1,
        created_at: ts("2024-01-01T00:00:00Z"),
    }
}

fn order(source_id: &str, customer: Option<&str>, total: &str, at: &str) -> NormalizedOrder {
    NormalizedOrder {
        source_order_id: source_id.to_string(),
        source_customer_id: customer.map(str::to_string),
        total_price: dec(total),
        total_discounts: Decimal::ZERO,
        financial_status: FinancialStatus::Paid,
        fulfillment_status: String::new(),
        created_at: ts(at),
    }
}

// ---------------------------------------------------------------------------
// Section 1: Tenants
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn ensure_tenant_is_idempotent(pool: sqlx::PgPool) {
    let first = ensure_tenant(&pool, "1").await.expect("ensure failed");
    assert!(first.is_active);
    assert!(first.shop_domain.is_empty());

    update_tenant_credentials(&pool, "1", "acme.myshopify.com", "shpat_x")
        .await
        .expect("update failed");

    let second = ensure_tenant(&pool, "1").await.expect("second ensure failed");
    assert_eq!(
        second.shop_domain, "acme.myshopify.com",
        "ensure must not reset an existing tenant"
    );
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn updating_unknown_tenant_is_not_found(pool: sqlx::PgPool) {
    let err = update_tenant_credentials(&pool, "missing", "x", "y")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound));
    assert!(get_tenant(&pool, "missing").await.expect("query").is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn deactivated_tenants_are_not_listed(pool: sqlx::PgPool) {
    ensure_tenant(&pool, "1").await.expect("ensure 1");
    ensure_tenant(&pool, "2").await.expect("ensure 2");
    set_tenant_active(&pool, "2", false).await.expect("deactivate");

    let ids: Vec<String> = list_active_tenants(&pool)
        .await
        .expect("list")
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec!["1".to_string()]);
}

// ---------------------------------------------------------------------------
// Section 2: Upserts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn customer_upsert_overwrites_in_place(pool: sqlx::PgPool) {
    ensure_tenant(&pool, "1").await.expect("ensure");

    let id1 = upsert_customer(&pool, "1", &customer("c1", "Ada", "10.00"))
        .await
        .expect("first upsert");
    let id2 = upsert_customer(&pool, "1", &customer("c1", "Ada", "99.50"))
        .await
        .expect("second upsert");

    assert_eq!(id1, id2);
    assert_eq!(count_customers(&pool, "1").await.expect("count"), 1);

    let top = list_top_customers(&pool, "1", 5).await.expect("top");
    assert_eq!(top[0].total_spent, dec("99.50"));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn same_source_id_in_two_tenants_is_two_rows(pool: sqlx::PgPool) {
    ensure_tenant(&pool, "1").await.expect("ensure 1");
    ensure_tenant(&pool, "2").await.expect("ensure 2");

    let a = upsert_customer(&pool, "1", &customer("c1", "Ada", "1"))
        .await
        .expect("tenant 1");
    let b = upsert_customer(&pool, "2", &customer("c1", "Bob", "2"))
        .await
        .expect("tenant 2");

    assert_ne!(a, b);
    assert_eq!(find_customer_id(&pool, "1", "c1").await.expect("find"), Some(a));
    assert_eq!(find_customer_id(&pool, "2", "c1").await.expect("find"), Some(b));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn product_upsert_is_idempotent(pool: sqlx::PgPool) {
    ensure_tenant(&pool, "1").await.expect("ensure");
    let product = NormalizedProduct {
        source_product_id: "p1".to_string(),
        title: "Lime Seltzer".to_string(),
        vendor: "Acme".to_string(),
        product_type: "Beverage".to_string(),
        price: dec("4.99"),
        inventory: 12,
        status: "active".to_string(),
        created_at: ts("2024-01-01T00:00:00Z"),
    };

    upsert_product(&pool, "1", &product).await.expect("first");
    upsert_product(&pool, "1", &product).await.expect("second");
    assert_eq!(count_products(&pool, "1").await.expect("count"), 1);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn negative_order_total_violates_check(pool: sqlx::PgPool) {
    ensure_tenant(&pool, "1").await.expect("ensure");
    let err = upsert_order(
        &pool,
        "1",
        None,
        &order("o1", None, "-1.00", "2024-01-01T00:00:00Z"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::Sqlx(_)));
}

// ---------------------------------------------------------------------------
// Section 3: Reads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn order_totals_and_date_range(pool: sqlx::PgPool) {
    ensure_tenant(&pool, "1").await.expect("ensure");
    let cid = upsert_customer(&pool, "1", &customer("c1", "Ada", "0"))
        .await
        .expect("customer");

    upsert_order(&pool, "1", Some(cid), &order("o1", Some("c1"), "10", "2024-01-01T10:00:00Z"))
        .await
        .expect("o1");
    upsert_order(&pool, "1", None, &order("o2", None, "5", "2024-01-01T23:59:59Z"))
        .await
        .expect("o2");
    upsert_order(&pool, "1", None, &order("o3", None, "20", "2024-01-02T00:00:00Z"))
        .await
        .expect("o3");

    let totals = order_totals(&pool, "1").await.expect("totals");
    assert_eq!(totals.order_count, 3);
    assert_eq!(totals.total_revenue, dec("35"));

    let day = NaiveDate::from_ymd_opt(2024, 1, 1);
    let days = list_orders_by_day(&pool, "1", day, day, 30)
        .await
        .expect("days");
    assert_eq!(days.len(), 1, "range bounds are inclusive calendar days");
    assert_eq!(days[0].order_count, 2);
    assert_eq!(days[0].revenue, dec("15"));

    let open = list_orders_by_day(&pool, "1", None, None, 30)
        .await
        .expect("open range");
    assert_eq!(open.len(), 2);
    assert_eq!(open[0].day.to_string(), "2024-01-02", "newest day first");

    let capped = list_orders_by_day(&pool, "1", None, None, 1)
        .await
        .expect("capped");
    assert_eq!(capped.len(), 1);

    let empty = order_totals(&pool, "other").await.expect("empty totals");
    assert_eq!(empty.order_count, 0);
    assert_eq!(empty.total_revenue, Decimal::ZERO);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn search_customers_filters_and_pages(pool: sqlx::PgPool) {
    ensure_tenant(&pool, "1").await.expect("ensure");
    for (id, name, spent) in [("c1", "Ada", "30"), ("c2", "Bob", "20"), ("c3", "Adaline", "10")] {
        upsert_customer(&pool, "1", &customer(id, name, spent))
            .await
            .expect("customer");
    }

    let page = search_customers(&pool, "1", Some("ada"), 1, 0)
        .await
        .expect("search");
    assert_eq!(page.total, 2);
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].first_name, "Ada");

    let all = search_customers(&pool, "1", None, 10, 0).await.expect("all");
    assert_eq!(all.total, 3);

    let cohorts = list_customer_cohorts(&pool, "1", 12).await.expect("cohorts");
    assert_eq!(cohorts.len(), 1);
    assert_eq!(cohorts[0].month.to_string(), "2024-01-01");
    assert_eq!(cohorts[0].customer_count, 3);
    assert_eq!(cohorts[0].returning_count, 0);
    assert_eq!(cohorts[0].total_spent, dec("60"));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn sales_group_by_utc_month_newest_first(pool: sqlx::PgPool) {
    ensure_tenant(&pool, "1").await.expect("ensure");
    let mut discounted = order("o1", None, "100", "2024-02-03T00:00:00Z");
    discounted.total_discounts = dec("10");
    upsert_order(&pool, "1", None, &discounted).await.expect("o1");
    upsert_order(&pool, "1", None, &order("o2", None, "50", "2024-02-20T00:00:00Z"))
        .await
        .expect("o2");
    // 23:30 at -05:00 on Jan 31 is Feb 1 in UTC.
    upsert_order(&pool, "1", None, &order("o3", None, "7", "2024-01-31T23:30:00-05:00"))
        .await
        .expect("o3");
    upsert_order(&pool, "1", None, &order("o4", None, "30", "2024-01-15T00:00:00Z"))
        .await
        .expect("o4");

    let months = list_sales_by_month(&pool, "1", 12).await.expect("months");

    assert_eq!(months.len(), 2);
    assert_eq!(months[0].month.to_string(), "2024-02-01");
    assert_eq!(months[0].order_count, 3);
    assert_eq!(months[0].gross_revenue, dec("157"));
    assert_eq!(months[0].discounts, dec("10"));
    assert_eq!(months[1].month.to_string(), "2024-01-01");
    assert_eq!(months[1].order_count, 1);

    let latest = list_sales_by_month(&pool, "1", 1).await.expect("capped");
    assert_eq!(latest.len(), 1);
}
