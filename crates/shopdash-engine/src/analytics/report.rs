//! Report shapes returned by the aggregator. Field names serialize in
//! camelCase; money serializes as a JSON number.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shopdash_core::TtlCache;

/// Per-tenant headline numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_customers: i64,
    pub total_products: i64,
    pub total_orders: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
}

/// Orders placed on one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyOrders {
    pub date: NaiveDate,
    pub order_count: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCustomer {
    pub id: String,
    /// `first last`, or the email when both names are blank.
    pub name: String,
    pub email: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_spent: Decimal,
    pub orders_count: i32,
}

/// Order revenue for one `YYYY-MM` month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySales {
    pub month: String,
    pub order_count: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub gross_revenue: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discounts: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_revenue: Decimal,
}

/// Customers who signed up in one `YYYY-MM` month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCohort {
    pub month: String,
    pub new_customers: u64,
    /// Members of the cohort with more than one order.
    pub returning_customers: u64,
    /// Average `total_spent` across the cohort, rounded to cents.
    #[serde(with = "rust_decimal::serde::float")]
    pub lifetime_value: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartAbandonmentSummary {
    pub total_abandoned: u64,
    pub total_completed: u64,
    pub total_started: u64,
    /// Percentage of started checkouts that were abandoned, two decimals.
    #[serde(with = "rust_decimal::serde::float")]
    pub abandonment_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub abandoned_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerListEntry {
    pub id: String,
    /// `first last`, or `"No Name"` when both are blank.
    pub name: String,
    pub email: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_spent: Decimal,
    pub orders_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    #[must_use]
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = total.div_ceil(u64::from(limit.max(1)));
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: u64::from(page) < total_pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerList {
    pub customers: Vec<CustomerListEntry>,
    pub pagination: Pagination,
}

/// A cached report. One variant per cached aggregator operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Dashboard(DashboardStats),
    SalesPerformance(Vec<MonthlySales>),
    CustomerBehavior(Vec<MonthlyCohort>),
}

/// Cache shared by the aggregator (reads, fills) and the sync engine
/// (clears after writes).
pub type ReportCache = TtlCache<Report>;
