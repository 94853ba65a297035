//! Pure period grouping. All periods are UTC.
//!
//! The fact-to-bucket half backs [`crate::store::MemoryStore`]; Postgres
//! groups in SQL. The bucket-to-report half shapes either for output.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

use super::report::{DailyOrders, MonthlyCohort, MonthlySales};
use crate::store::{CohortBucket, CustomerFact, DayBucket, OrderFact, SalesBucket};

/// Most recent days reported by `orders_by_date`.
pub const MAX_DAYS: usize = 30;
/// Most recent months reported by the monthly reports.
pub const MAX_MONTHS: usize = 12;

pub(crate) fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn month_key(day: NaiveDate) -> String {
    format!("{:04}-{:02}", day.year(), day.month())
}

fn first_of_month(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

fn signed(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn unsigned(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Facts to buckets
// ---------------------------------------------------------------------------

/// Orders per day, newest day first, at most `cap` days.
#[must_use]
pub fn orders_by_day(facts: &[OrderFact], cap: usize) -> Vec<DayBucket> {
    let mut days: BTreeMap<NaiveDate, (usize, Decimal)> = BTreeMap::new();
    for fact in facts {
        let entry = days
            .entry(fact.created_at.date_naive())
            .or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += fact.total_price;
    }

    days.into_iter()
        .rev()
        .take(cap)
        .map(|(day, (orders, revenue))| DayBucket {
            day,
            orders: signed(orders),
            revenue,
        })
        .collect()
}

/// Gross revenue and discounts per month, newest month first, at most `cap`
/// months.
#[must_use]
pub fn sales_by_month(facts: &[OrderFact], cap: usize) -> Vec<SalesBucket> {
    #[derive(Default)]
    struct Acc {
        orders: usize,
        gross: Decimal,
        discounts: Decimal,
    }

    let mut months: BTreeMap<NaiveDate, Acc> = BTreeMap::new();
    for fact in facts {
        let acc = months
            .entry(first_of_month(fact.created_at.date_naive()))
            .or_default();
        acc.orders += 1;
        acc.gross += fact.total_price;
        acc.discounts += fact.total_discounts;
    }

    months
        .into_iter()
        .rev()
        .take(cap)
        .map(|(month, acc)| SalesBucket {
            month,
            orders: signed(acc.orders),
            gross: acc.gross,
            discounts: acc.discounts,
        })
        .collect()
}

/// Signup cohorts per month, newest month first, at most `cap` months.
#[must_use]
pub fn cohorts_by_month(facts: &[CustomerFact], cap: usize) -> Vec<CohortBucket> {
    #[derive(Default)]
    struct Acc {
        customers: usize,
        returning: usize,
        spent: Decimal,
    }

    let mut months: BTreeMap<NaiveDate, Acc> = BTreeMap::new();
    for fact in facts {
        let acc = months
            .entry(first_of_month(fact.created_at.date_naive()))
            .or_default();
        acc.customers += 1;
        if fact.orders_count > 1 {
            acc.returning += 1;
        }
        acc.spent += fact.total_spent;
    }

    months
        .into_iter()
        .rev()
        .take(cap)
        .map(|(month, acc)| CohortBucket {
            month,
            customers: signed(acc.customers),
            returning: signed(acc.returning),
            total_spent: acc.spent,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Buckets to reports
// ---------------------------------------------------------------------------

#[must_use]
pub fn daily_orders(bucket: DayBucket) -> DailyOrders {
    DailyOrders {
        date: bucket.day,
        order_count: unsigned(bucket.orders),
        total_revenue: bucket.revenue,
    }
}

/// Net revenue is gross minus discounts.
#[must_use]
pub fn monthly_sales(bucket: SalesBucket) -> MonthlySales {
    MonthlySales {
        month: month_key(bucket.month),
        order_count: unsigned(bucket.orders),
        gross_revenue: bucket.gross,
        discounts: bucket.discounts,
        net_revenue: bucket.gross - bucket.discounts,
    }
}

/// Lifetime value is the cohort's average spend, rounded to cents.
#[must_use]
pub fn monthly_cohort(bucket: CohortBucket) -> MonthlyCohort {
    MonthlyCohort {
        month: month_key(bucket.month),
        new_customers: unsigned(bucket.customers),
        returning_customers: unsigned(bucket.returning),
        lifetime_value: if bucket.customers <= 0 {
            Decimal::ZERO
        } else {
            round_cents(bucket.total_spent / Decimal::from(bucket.customers))
        },
    }
}

/// `abandoned / (abandoned + completed)` as a percentage with two decimals;
/// zero when nothing was started.
#[must_use]
pub fn abandonment_rate(abandoned: u64, completed: u64) -> Decimal {
    let started = abandoned.saturating_add(completed);
    if started == 0 {
        return Decimal::ZERO;
    }
    round_cents(Decimal::from(abandoned) * Decimal::ONE_HUNDRED / Decimal::from(started))
}

/// `trim(first + " " + last)`, or `None` if that is empty.
#[must_use]
pub fn display_name(first_name: &str, last_name: &str) -> Option<String> {
    let name = format!("{first_name} {last_name}");
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_owned())
}
