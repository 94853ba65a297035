mod api;
mod middleware;
mod scheduler;

use std::{sync::Arc, time::Duration};

use shopdash_engine::{Aggregator, PgStore, ReportCache, SyncEngine};
use shopdash_shopify::ShopifyClient;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(shopdash_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = shopdash_db::PoolConfig::from_app_config(&config);
    let pool = shopdash_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = shopdash_db::run_migrations(&pool).await?;
    tracing::info!(applied, "database migrations up to date");

    let client = Arc::new(ShopifyClient::from_app_config(&config)?);
    let store = Arc::new(PgStore::new(pool.clone()));
    let cache = Arc::new(ReportCache::new(Duration::from_secs(config.cache_ttl_secs)));

    let engine = Arc::new(
        SyncEngine::new(
            store.clone(),
            store.clone(),
            Arc::clone(&client),
            Arc::clone(&cache),
        )
        .with_page_size(config.shopify_page_size)
        .with_strategy(config.sync_strategy),
    );
    let analytics = Arc::new(Aggregator::new(store.clone(), store.clone(), client, cache));

    let _scheduler = match config.sync_cron.as_deref() {
        Some(cron) => {
            Some(scheduler::build_scheduler(Arc::clone(&engine), store, cron).await?)
        }
        None => {
            tracing::info!("SHOPDASH_SYNC_CRON not set; scheduled sync disabled");
            None
        }
    };

    let auth = AuthState::from_env(matches!(
        config.env,
        shopdash_core::Environment::Development
    ))?;
    let app = build_app(
        AppState {
            pool,
            engine,
            analytics,
        },
        auth,
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "shopdash server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
