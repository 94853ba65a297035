//! `sync` command: runs the sync engine once for one tenant.

use clap::ValueEnum;
use shopdash_core::ResourceKind;
use shopdash_engine::{SyncAllReport, SyncResult};

use crate::Services;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SyncTarget {
    Customers,
    Products,
    Orders,
    All,
}

impl SyncTarget {
    fn kind(self) -> Option<ResourceKind> {
        match self {
            Self::Customers => Some(ResourceKind::Customers),
            Self::Products => Some(ResourceKind::Products),
            Self::Orders => Some(ResourceKind::Orders),
            Self::All => None,
        }
    }
}

/// # Errors
///
/// Returns an error if any requested resource failed outright. Per-record
/// failures are printed but do not fail the command.
pub(crate) async fn run(
    services: &Services,
    target: SyncTarget,
    tenant_id: &str,
) -> anyhow::Result<()> {
    let engine = services.engine();
    tracing::info!(tenant_id, ?target, strategy = %engine.strategy(), "starting sync");

    let Some(kind) = target.kind() else {
        let report = engine.sync_all(tenant_id).await;
        print_all(&report);
        if !report.success() {
            anyhow::bail!("sync of tenant {tenant_id} did not complete for every resource");
        }
        return Ok(());
    };

    let result = engine.sync_resource(tenant_id, kind).await?;
    print_result(&result);
    Ok(())
}

fn print_result(result: &SyncResult) {
    println!("{}", result.message());
    for error in &result.errors {
        println!("  skipped {error}");
    }
}

fn print_all(report: &SyncAllReport) {
    for (kind, outcome) in report.outcomes() {
        match outcome {
            Ok(result) => print_result(result),
            Err(e) => println!("{kind}: failed: {e}"),
        }
    }
    println!(
        "total: synced {} of {} records for tenant {}",
        report.synced(),
        report.total(),
        report.tenant_id
    );
}
