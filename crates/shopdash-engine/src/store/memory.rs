use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shopdash_core::{NormalizedCustomer, NormalizedOrder, NormalizedProduct, TenantConfig};

use super::{
    AnalyticsStore, CohortBucket, CustomerFact, CustomerPage, CustomerSummary, DashboardTotals,
    DateRange, DayBucket, OrderFact, SalesBucket, StoreError, SyncStore, TenantRegistry,
};
use crate::analytics::grouping;

/// Records whose first-seen timestamp survives an upsert, like the
/// `created_at` columns the Postgres upserts never overwrite.
trait Created {
    fn created_at_mut(&mut self) -> &mut DateTime<Utc>;
}

impl Created for NormalizedCustomer {
    fn created_at_mut(&mut self) -> &mut DateTime<Utc> {
        &mut self.created_at
    }
}

impl Created for NormalizedProduct {
    fn created_at_mut(&mut self) -> &mut DateTime<Utc> {
        &mut self.created_at
    }
}

impl Created for (Option<i64>, NormalizedOrder) {
    fn created_at_mut(&mut self) -> &mut DateTime<Utc> {
        &mut self.1.created_at
    }
}

/// Rows live in insertion order; `index` maps `(tenant, source id)` to a
/// position in `rows`.
struct Table<T> {
    rows: Vec<Stored<T>>,
    index: HashMap<(String, String), usize>,
}

struct Stored<T> {
    id: i64,
    tenant_id: String,
    record: T,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Created> Table<T> {
    /// Inserts or replaces the record under `(tenant_id, source_id)`. A
    /// replaced record keeps the stored `created_at`.
    fn upsert(
        &mut self,
        next_id: &mut i64,
        tenant_id: &str,
        source_id: &str,
        mut record: T,
    ) -> i64 {
        let key = (tenant_id.to_owned(), source_id.to_owned());
        if let Some(&pos) = self.index.get(&key) {
            let row = &mut self.rows[pos];
            *record.created_at_mut() = *row.record.created_at_mut();
            row.record = record;
            return row.id;
        }

        *next_id += 1;
        let id = *next_id;
        self.index.insert(key, self.rows.len());
        self.rows.push(Stored {
            id,
            tenant_id: tenant_id.to_owned(),
            record,
        });
        id
    }
}

impl<T> Table<T> {
    fn get(&self, tenant_id: &str, source_id: &str) -> Option<&Stored<T>> {
        self.index
            .get(&(tenant_id.to_owned(), source_id.to_owned()))
            .map(|&pos| &self.rows[pos])
    }

    fn for_tenant<'a>(&'a self, tenant_id: &'a str) -> impl Iterator<Item = &'a Stored<T>> + 'a {
        self.rows.iter().filter(move |row| row.tenant_id == tenant_id)
    }
}

#[derive(Default)]
struct State {
    next_id: i64,
    tenants: BTreeMap<String, TenantConfig>,
    customers: Table<NormalizedCustomer>,
    products: Table<NormalizedProduct>,
    orders: Table<(Option<i64>, NormalizedOrder)>,
}

impl State {
    fn require_tenant(&self, tenant_id: &str) -> Result<(), StoreError> {
        if self.tenants.contains_key(tenant_id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!(
                "tenant {tenant_id} does not exist"
            )))
        }
    }

    fn tenant_mut(&mut self, tenant_id: &str) -> Result<&mut TenantConfig, StoreError> {
        self.tenants
            .get_mut(tenant_id)
            .ok_or_else(|| StoreError::TenantNotFound(tenant_id.to_owned()))
    }
}

/// Process-local store with the same keying and ordering rules as the
/// Postgres schema, including its non-negative amount checks.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a tenant as given.
    pub fn insert_tenant(&self, tenant: TenantConfig) {
        self.lock().tenants.insert(tenant.id.clone(), tenant);
    }

    /// The stored customer link of an order: `None` if the order is unknown,
    /// `Some(None)` if it is stored without a customer.
    #[must_use]
    pub fn order_customer_id(&self, tenant_id: &str, source_order_id: &str) -> Option<Option<i64>> {
        self.lock()
            .orders
            .get(tenant_id, source_order_id)
            .map(|row| row.record.0)
    }

    #[must_use]
    pub fn customer(&self, tenant_id: &str, source_customer_id: &str) -> Option<NormalizedCustomer> {
        self.lock()
            .customers
            .get(tenant_id, source_customer_id)
            .map(|row| row.record.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryStore")
            .field("tenants", &state.tenants.len())
            .field("customers", &state.customers.rows.len())
            .field("products", &state.products.rows.len())
            .field("orders", &state.orders.rows.len())
            .finish()
    }
}

fn order_fact(order: &NormalizedOrder) -> OrderFact {
    OrderFact {
        total_price: order.total_price,
        total_discounts: order.total_discounts,
        created_at: order.created_at,
    }
}

fn summary(customer: &NormalizedCustomer) -> CustomerSummary {
    CustomerSummary {
        source_customer_id: customer.source_customer_id.clone(),
        email: customer.email.clone(),
        first_name: customer.first_name.clone(),
        last_name: customer.last_name.clone(),
        total_spent: customer.total_spent,
        orders_count: customer.orders_count,
        created_at: customer.created_at,
    }
}

/// Highest spenders first. `sort_by` is stable, so ties keep insertion order.
fn by_spend_desc(customers: &mut [&NormalizedCustomer]) {
    customers.sort_by(|a, b| b.total_spent.cmp(&a.total_spent));
}

fn matches_search(customer: &NormalizedCustomer, needle: &str) -> bool {
    [&customer.email, &customer.first_name, &customer.last_name]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

#[async_trait]
impl TenantRegistry for MemoryStore {
    async fn find(&self, tenant_id: &str) -> Result<Option<TenantConfig>, StoreError> {
        Ok(self.lock().tenants.get(tenant_id).cloned())
    }

    async fn ensure(&self, tenant_id: &str) -> Result<TenantConfig, StoreError> {
        Ok(self
            .lock()
            .tenants
            .entry(tenant_id.to_owned())
            .or_insert_with(|| TenantConfig::unconfigured(tenant_id))
            .clone())
    }

    async fn update_credentials(
        &self,
        tenant_id: &str,
        shop_domain: &str,
        access_token: &str,
    ) -> Result<TenantConfig, StoreError> {
        let mut state = self.lock();
        let tenant = state.tenant_mut(tenant_id)?;
        shop_domain.clone_into(&mut tenant.shop_domain);
        access_token.clone_into(&mut tenant.access_token);
        Ok(tenant.clone())
    }

    async fn set_active(
        &self,
        tenant_id: &str,
        is_active: bool,
    ) -> Result<TenantConfig, StoreError> {
        let mut state = self.lock();
        let tenant = state.tenant_mut(tenant_id)?;
        tenant.is_active = is_active;
        Ok(tenant.clone())
    }

    async fn list_active(&self) -> Result<Vec<TenantConfig>, StoreError> {
        Ok(self
            .lock()
            .tenants
            .values()
            .filter(|t| t.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn upsert_customer(
        &self,
        tenant_id: &str,
        customer: &NormalizedCustomer,
    ) -> Result<i64, StoreError> {
        let mut state = self.lock();
        state.require_tenant(tenant_id)?;
        if customer.orders_count < 0 {
            return Err(StoreError::Constraint("orders_count must be >= 0".to_owned()));
        }

        let State {
            next_id, customers, ..
        } = &mut *state;
        Ok(customers.upsert(
            next_id,
            tenant_id,
            &customer.source_customer_id,
            customer.clone(),
        ))
    }

    async fn upsert_product(
        &self,
        tenant_id: &str,
        product: &NormalizedProduct,
    ) -> Result<i64, StoreError> {
        let mut state = self.lock();
        state.require_tenant(tenant_id)?;

        let State {
            next_id, products, ..
        } = &mut *state;
        Ok(products.upsert(
            next_id,
            tenant_id,
            &product.source_product_id,
            product.clone(),
        ))
    }

    async fn find_customer_id(
        &self,
        tenant_id: &str,
        source_customer_id: &str,
    ) -> Result<Option<i64>, StoreError> {
        Ok(self
            .lock()
            .customers
            .get(tenant_id, source_customer_id)
            .map(|row| row.id))
    }

    async fn upsert_order(
        &self,
        tenant_id: &str,
        customer_id: Option<i64>,
        order: &NormalizedOrder,
    ) -> Result<i64, StoreError> {
        let mut state = self.lock();
        state.require_tenant(tenant_id)?;
        if order.total_price.is_sign_negative() && !order.total_price.is_zero() {
            return Err(StoreError::Constraint("total_price must be >= 0".to_owned()));
        }
        if order.total_discounts.is_sign_negative() && !order.total_discounts.is_zero() {
            return Err(StoreError::Constraint(
                "total_discounts must be >= 0".to_owned(),
            ));
        }

        let State {
            next_id, orders, ..
        } = &mut *state;
        Ok(orders.upsert(
            next_id,
            tenant_id,
            &order.source_order_id,
            (customer_id, order.clone()),
        ))
    }
}

#[async_trait]
impl AnalyticsStore for MemoryStore {
    async fn dashboard_totals(&self, tenant_id: &str) -> Result<DashboardTotals, StoreError> {
        let state = self.lock();
        let count = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);

        let (orders, revenue) = state
            .orders
            .for_tenant(tenant_id)
            .fold((0usize, Decimal::ZERO), |(n, sum), row| {
                (n + 1, sum + row.record.1.total_price)
            });

        Ok(DashboardTotals {
            customers: count(state.customers.for_tenant(tenant_id).count()),
            products: count(state.products.for_tenant(tenant_id).count()),
            orders: count(orders),
            revenue,
        })
    }

    async fn orders_by_day(
        &self,
        tenant_id: &str,
        range: DateRange,
        limit: usize,
    ) -> Result<Vec<DayBucket>, StoreError> {
        let facts: Vec<OrderFact> = self
            .lock()
            .orders
            .for_tenant(tenant_id)
            .map(|row| &row.record.1)
            .filter(|order| range.contains(order.created_at.date_naive()))
            .map(order_fact)
            .collect();
        Ok(grouping::orders_by_day(&facts, limit))
    }

    async fn sales_by_month(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<SalesBucket>, StoreError> {
        let facts: Vec<OrderFact> = self
            .lock()
            .orders
            .for_tenant(tenant_id)
            .map(|row| order_fact(&row.record.1))
            .collect();
        Ok(grouping::sales_by_month(&facts, limit))
    }

    async fn cohorts_by_month(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<CohortBucket>, StoreError> {
        let facts: Vec<CustomerFact> = self
            .lock()
            .customers
            .for_tenant(tenant_id)
            .map(|row| CustomerFact {
                total_spent: row.record.total_spent,
                orders_count: row.record.orders_count,
                created_at: row.record.created_at,
            })
            .collect();
        Ok(grouping::cohorts_by_month(&facts, limit))
    }

    async fn top_customers(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<CustomerSummary>, StoreError> {
        let state = self.lock();
        let mut customers: Vec<&NormalizedCustomer> = state
            .customers
            .for_tenant(tenant_id)
            .map(|row| &row.record)
            .collect();
        by_spend_desc(&mut customers);
        Ok(customers.into_iter().take(limit).map(summary).collect())
    }

    async fn search_customers(
        &self,
        tenant_id: &str,
        search: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<CustomerPage, StoreError> {
        let needle = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let state = self.lock();
        let mut customers: Vec<&NormalizedCustomer> = state
            .customers
            .for_tenant(tenant_id)
            .map(|row| &row.record)
            .filter(|c| needle.as_deref().is_none_or(|n| matches_search(c, n)))
            .collect();
        by_spend_desc(&mut customers);

        Ok(CustomerPage {
            total: u64::try_from(customers.len()).unwrap_or(u64::MAX),
            customers: customers
                .into_iter()
                .skip(offset)
                .take(limit)
                .map(summary)
                .collect(),
        })
    }
}
