//! Background job scheduler.
//!
//! When a sync cron expression is configured, registers one job that runs a
//! full sync for every active tenant.

use std::sync::Arc;

use shopdash_engine::{SyncEngine, TenantRegistry};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// `cron` is not a valid expression, or the scheduler fails to start.
pub async fn build_scheduler(
    engine: Arc<SyncEngine>,
    registry: Arc<dyn TenantRegistry>,
    cron: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_sync_job(&scheduler, engine, registry, cron).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_sync_job(
    scheduler: &JobScheduler,
    engine: Arc<SyncEngine>,
    registry: Arc<dyn TenantRegistry>,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let engine = Arc::clone(&engine);
        let registry = Arc::clone(&registry);

        Box::pin(async move {
            tracing::info!("scheduler: starting tenant sync run");
            run_sync_job(&engine, registry.as_ref()).await;
            tracing::info!("scheduler: tenant sync run complete");
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: registered tenant sync job");
    Ok(())
}

/// Syncs every active tenant that has credentials, one tenant at a time.
pub(crate) async fn run_sync_job(engine: &SyncEngine, registry: &dyn TenantRegistry) {
    let tenants = match registry.list_active().await {
        Ok(tenants) => tenants,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to load active tenants");
            return;
        }
    };

    if tenants.is_empty() {
        tracing::info!("scheduler: no active tenants; skipping");
        return;
    }

    for tenant in &tenants {
        if !tenant.has_credentials() {
            tracing::warn!(tenant_id = %tenant.id, "scheduler: tenant has no credentials; skipping");
            continue;
        }

        let report = engine.sync_all(&tenant.id).await;
        if report.success() {
            tracing::info!(
                tenant_id = %tenant.id,
                synced = report.synced(),
                total = report.total(),
                "scheduler: tenant synced"
            );
        } else {
            for (kind, outcome) in report.outcomes() {
                if let Err(e) = outcome {
                    tracing::error!(
                        tenant_id = %tenant.id,
                        kind = %kind,
                        error = %e,
                        "scheduler: resource sync failed"
                    );
                }
            }
        }
    }
}
