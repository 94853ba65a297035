//! Fetch-then-upsert of one resource kind, or all three, for one tenant.
//!
//! Each record is mapped and upserted on its own: a record that fails is
//! collected into the [`SyncResult`] and the batch carries on. Only tenant
//! problems and source failures abort an invocation.

use std::sync::Arc;

use futures::TryStreamExt;
use serde_json::Value;
use shopdash_core::{ResourceKind, SyncStrategy, TenantConfig};
use shopdash_shopify::{
    normalize_customer, normalize_order, normalize_product, source_id, ShopifyClient,
    MAX_PAGE_SIZE,
};

use crate::analytics::report::ReportCache;
use crate::error::{RecordError, RecordFailure, SyncError};
use crate::store::{SyncStore, TenantRegistry};

/// Lifecycle of one `sync_resource` invocation. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Fetching,
    Upserting,
    Completed,
    Failed,
}

/// Outcome of a sync that ran to the end of the collection.
#[derive(Debug)]
pub struct SyncResult {
    pub tenant_id: String,
    pub kind: ResourceKind,
    /// Records stored.
    pub synced: usize,
    /// Records fetched.
    pub total: usize,
    pub errors: Vec<RecordError>,
}

impl SyncResult {
    fn new(tenant_id: &str, kind: ResourceKind) -> Self {
        Self {
            tenant_id: tenant_id.to_owned(),
            kind,
            synced: 0,
            total: 0,
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "Synced {} of {} {} for tenant {}",
            self.synced, self.total, self.kind, self.tenant_id
        )
    }
}

/// Outcomes of the three syncs run by [`SyncEngine::sync_all`].
#[derive(Debug)]
pub struct SyncAllReport {
    pub tenant_id: String,
    pub customers: Result<SyncResult, SyncError>,
    pub products: Result<SyncResult, SyncError>,
    pub orders: Result<SyncResult, SyncError>,
}

impl SyncAllReport {
    /// `true` unless one of the three syncs failed outright. Per-record
    /// failures inside a sync do not count.
    #[must_use]
    pub fn success(&self) -> bool {
        self.outcomes().iter().all(|(_, outcome)| outcome.is_ok())
    }

    #[must_use]
    pub fn outcomes(&self) -> [(ResourceKind, &Result<SyncResult, SyncError>); 3] {
        [
            (ResourceKind::Customers, &self.customers),
            (ResourceKind::Products, &self.products),
            (ResourceKind::Orders, &self.orders),
        ]
    }

    #[must_use]
    pub fn synced(&self) -> usize {
        self.outcomes()
            .iter()
            .filter_map(|(_, outcome)| outcome.as_ref().ok())
            .map(|result| result.synced)
            .sum()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes()
            .iter()
            .filter_map(|(_, outcome)| outcome.as_ref().ok())
            .map(|result| result.total)
            .sum()
    }
}

/// Tracks state and counts while one invocation runs.
struct SyncRun {
    state: SyncState,
    result: SyncResult,
}

impl SyncRun {
    fn advance(&mut self, next: SyncState) {
        if self.state == next {
            return;
        }
        tracing::debug!(
            tenant_id = %self.result.tenant_id,
            kind = %self.result.kind,
            from = ?self.state,
            to = ?next,
            "sync state changed"
        );
        self.state = next;
    }
}

pub struct SyncEngine {
    registry: Arc<dyn TenantRegistry>,
    store: Arc<dyn SyncStore>,
    client: Arc<ShopifyClient>,
    cache: Arc<ReportCache>,
    page_size: u32,
    strategy: SyncStrategy,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        registry: Arc<dyn TenantRegistry>,
        store: Arc<dyn SyncStore>,
        client: Arc<ShopifyClient>,
        cache: Arc<ReportCache>,
    ) -> Self {
        Self {
            registry,
            store,
            client,
            cache,
            page_size: MAX_PAGE_SIZE,
            strategy: SyncStrategy::default(),
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    /// Pulls every record of `kind` for the tenant and upserts it.
    ///
    /// Orders are linked to the local customer row with the same Shopify
    /// customer id, if one has been synced already; otherwise the link stays
    /// empty and is not revisited.
    ///
    /// The report cache is cleared whenever at least one row was written or
    /// the sync completed, including when a later page failed.
    ///
    /// # Errors
    ///
    /// - [`SyncError::TenantNotFound`], [`SyncError::TenantInactive`],
    ///   [`SyncError::MissingCredentials`] before anything is fetched.
    /// - [`SyncError::Source`] if a page cannot be fetched. Records stored
    ///   before the failure stay stored.
    /// - [`SyncError::Store`] if the tenant lookup itself fails.
    pub async fn sync_resource(
        &self,
        tenant_id: &str,
        kind: ResourceKind,
    ) -> Result<SyncResult, SyncError> {
        let mut run = SyncRun {
            state: SyncState::Idle,
            result: SyncResult::new(tenant_id, kind),
        };

        let outcome = self.drive(&mut run).await;

        if run.result.synced > 0 || outcome.is_ok() {
            self.cache.clear();
        }

        match outcome {
            Ok(()) => {
                run.advance(SyncState::Completed);
                let result = run.result;
                tracing::info!(
                    tenant_id,
                    kind = %kind,
                    synced = result.synced,
                    total = result.total,
                    failed = result.errors.len(),
                    "sync completed"
                );
                Ok(result)
            }
            Err(e) => {
                run.advance(SyncState::Failed);
                tracing::error!(
                    tenant_id,
                    kind = %kind,
                    synced = run.result.synced,
                    total = run.result.total,
                    error = %e,
                    "sync failed"
                );
                Err(e)
            }
        }
    }

    /// Runs the customer, product and order syncs and collects all three
    /// outcomes. With [`SyncStrategy::Concurrent`] they run together; with
    /// [`SyncStrategy::CustomersFirst`] customers finish before the other
    /// two start, so every order can find its customer.
    pub async fn sync_all(&self, tenant_id: &str) -> SyncAllReport {
        let (customers, products, orders) = match self.strategy {
            SyncStrategy::Concurrent => tokio::join!(
                self.sync_resource(tenant_id, ResourceKind::Customers),
                self.sync_resource(tenant_id, ResourceKind::Products),
                self.sync_resource(tenant_id, ResourceKind::Orders),
            ),
            SyncStrategy::CustomersFirst => {
                let customers = self.sync_resource(tenant_id, ResourceKind::Customers).await;
                let (products, orders) = tokio::join!(
                    self.sync_resource(tenant_id, ResourceKind::Products),
                    self.sync_resource(tenant_id, ResourceKind::Orders),
                );
                (customers, products, orders)
            }
        };

        let report = SyncAllReport {
            tenant_id: tenant_id.to_owned(),
            customers,
            products,
            orders,
        };
        tracing::info!(
            tenant_id,
            strategy = %self.strategy,
            success = report.success(),
            synced = report.synced(),
            total = report.total(),
            "sync all finished"
        );
        report
    }

    async fn drive(&self, run: &mut SyncRun) -> Result<(), SyncError> {
        let tenant = self.usable_tenant(&run.result.tenant_id).await?;
        let kind = run.result.kind;

        run.advance(SyncState::Fetching);
        let mut records = self.client.fetch_collection(&tenant, kind, self.page_size);

        while let Some(raw) = records.try_next().await? {
            run.advance(SyncState::Upserting);
            run.result.total += 1;

            match self.store_record(&tenant.id, kind, &raw).await {
                Ok(()) => run.result.synced += 1,
                Err(reason) => {
                    let err = RecordError {
                        source_id: source_id(&raw),
                        reason,
                    };
                    tracing::warn!(
                        tenant_id = %tenant.id,
                        kind = %kind,
                        error = %err,
                        "record skipped"
                    );
                    run.result.errors.push(err);
                }
            }
        }

        Ok(())
    }

    async fn usable_tenant(&self, tenant_id: &str) -> Result<TenantConfig, SyncError> {
        let tenant = self.registry.resolve(tenant_id).await?;
        if !tenant.is_active {
            return Err(SyncError::TenantInactive(tenant.id));
        }
        if !tenant.has_credentials() {
            return Err(SyncError::MissingCredentials(tenant.id));
        }
        Ok(tenant)
    }

    async fn store_record(
        &self,
        tenant_id: &str,
        kind: ResourceKind,
        raw: &Value,
    ) -> Result<(), RecordFailure> {
        match kind {
            ResourceKind::Customers => {
                let customer = normalize_customer(raw)?;
                self.store.upsert_customer(tenant_id, &customer).await?;
            }
            ResourceKind::Products => {
                let product = normalize_product(raw)?;
                self.store.upsert_product(tenant_id, &product).await?;
            }
            ResourceKind::Orders => {
                let order = normalize_order(raw)?;
                let customer_id = match order.source_customer_id.as_deref() {
                    Some(source_customer_id) => {
                        self.store
                            .find_customer_id(tenant_id, source_customer_id)
                            .await?
                    }
                    None => None,
                };
                self.store
                    .upsert_order(tenant_id, customer_id, &order)
                    .await?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("page_size", &self.page_size)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}
