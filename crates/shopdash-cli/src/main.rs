mod report;
mod sync;
mod tenant;

use std::{sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use shopdash_core::AppConfig;
use shopdash_engine::{Aggregator, PgStore, ReportCache, SyncEngine};
use shopdash_shopify::ShopifyClient;
use tracing_subscriber::EnvFilter;

use crate::{report::ReportCommands, sync::SyncTarget, tenant::TenantCommands};

#[derive(Debug, Parser)]
#[command(name = "shopdash-cli")]
#[command(about = "Shopdash command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Register and configure tenants
    Tenant {
        #[command(subcommand)]
        command: TenantCommands,
    },
    /// Pull one resource, or all three, from a tenant's shop into the database
    Sync {
        #[arg(value_enum)]
        target: SyncTarget,
        /// Tenant to sync
        #[arg(long, default_value = "1")]
        tenant: String,
    },
    /// Print an analytics report as JSON
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database answers
    Ping,
    /// Apply pending migrations
    Migrate,
}

/// Everything a command needs once config and the pool are up.
pub(crate) struct Services {
    pub config: AppConfig,
    pub pool: sqlx::PgPool,
    pub store: Arc<PgStore>,
    pub client: Arc<ShopifyClient>,
    pub cache: Arc<ReportCache>,
}

impl Services {
    async fn connect(config: AppConfig) -> anyhow::Result<Self> {
        let pool_config = shopdash_db::PoolConfig::from_app_config(&config);
        let pool = shopdash_db::connect_pool(&config.database_url, pool_config).await?;
        let client = ShopifyClient::from_app_config(&config)
            .map_err(|e| anyhow::anyhow!("failed to build Shopify client: {e}"))?;
        let cache = ReportCache::new(Duration::from_secs(config.cache_ttl_secs));

        Ok(Self {
            store: Arc::new(PgStore::new(pool.clone())),
            client: Arc::new(client),
            cache: Arc::new(cache),
            config,
            pool,
        })
    }

    pub(crate) fn engine(&self) -> SyncEngine {
        SyncEngine::new(
            self.store.clone(),
            self.store.clone(),
            Arc::clone(&self.client),
            Arc::clone(&self.cache),
        )
        .with_page_size(self.config.shopify_page_size)
        .with_strategy(self.config.sync_strategy)
    }

    pub(crate) fn aggregator(&self) -> Aggregator {
        Aggregator::new(
            self.store.clone(),
            self.store.clone(),
            Arc::clone(&self.client),
            Arc::clone(&self.cache),
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("shopdash-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = shopdash_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let services = Services::connect(config).await?;

    match command {
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            shopdash_db::health_check(&services.pool).await?;
            println!("database: ok");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = shopdash_db::run_migrations(&services.pool).await?;
            println!("migrations applied: {applied}");
        }
        Commands::Tenant { command } => tenant::run(&services, command).await?,
        Commands::Sync { target, tenant } => sync::run(&services, target, &tenant).await?,
        Commands::Report { command } => report::run(&services, command).await?,
    }

    Ok(())
}
