//! sessiond server entry point.
//!
//! Opens the session store, serves the REST API, and exits non-zero when
//! the store reports a fatal database condition.

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use sessiond::api;
use sessiond::app_state::AppState;
use sessiond::config::ServiceConfig;
use sessiond::domain::{HealthMonitor, StoreHealth};
use sessiond::persistence::PgSessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = ServiceConfig::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;
    tracing::info!(
        addr = %config.listen_addr,
        table = %config.store.schema.table_name,
        "starting sessiond"
    );

    // Open the store: pool, schema bootstrap, sweeper
    let health = HealthMonitor::new();
    let (store, sweeper) = PgSessionStore::open(&config.store, health.clone()).await?;

    let app_state = AppState {
        store,
        health: health.clone(),
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    let watchdog = health.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                reason = watchdog.wait_for_fatal() => {
                    tracing::error!(%reason, "store is unserviceable, shutting down");
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown requested");
                }
            }
        })
        .await?;

    drop(sweeper);

    if let StoreHealth::Fatal { reason } = health.current() {
        anyhow::bail!("session store failed: {reason}");
    }
    Ok(())
}
