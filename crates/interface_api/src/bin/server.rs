//! Ops Registry - API Server Binary
//!
//! # Usage
//!
//! ```bash
//! API_STORE_BACKEND=postgres API_DATABASE_URL=postgres://... cargo run --bin registry-api
//! API_STORE_BACKEND=hosted API_HOSTED_URL=https://... API_HOSTED_KEY=... cargo run --bin registry-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` / `API_PORT` - Bind address (default: 0.0.0.0:8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_STORE_BACKEND` - `postgres` (default) or `hosted`
//! * `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_HOSTED_URL` / `API_HOSTED_KEY` - Hosted store project URL and key
//! * `API_TIMEZONE` - Timezone for site id dates (default: Asia/Kolkata)
//! * `API_MAX_ID_ATTEMPTS` - Insert attempts for contested ids (default: 3)
//! * `API_LOG_LEVEL` - trace, debug, info, warn, error (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_registry::{HostedRowStore, RegistrationService, RowStore};
use infra_db::{create_pool, run_migrations, DatabaseConfig, PgRowStore};
use interface_api::{
    config::{ApiConfig, StoreBackend},
    create_router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("loading API configuration")?;
    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        backend = ?config.store_backend,
        "Starting Ops Registry API Server"
    );

    let store = connect_store(&config).await?;
    let service = RegistrationService::new(store)
        .with_calendar(config.calendar()?)
        .with_conflict_policy(config.conflict_policy());

    let app = create_router(service, config.clone());
    let addr: SocketAddr = config.server_addr().parse()?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber; `RUST_LOG` overrides the configured level
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Builds the configured row store
///
/// The postgres backend applies the schema before serving.
async fn connect_store(config: &ApiConfig) -> anyhow::Result<Arc<dyn RowStore>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let pool = create_pool(DatabaseConfig::new(&config.database_url))
                .await
                .context("connecting to PostgreSQL")?;
            run_migrations(&pool).await?;
            tracing::info!("Database ready");
            Ok(Arc::new(PgRowStore::new(pool)))
        }
        StoreBackend::Hosted => {
            let hosted = HostedRowStore::new(config.hosted_store_config()?)
                .context("configuring the hosted store client")?;
            tracing::info!(base_url = %hosted.base_url(), "Using hosted store");
            Ok(Arc::new(hosted))
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
