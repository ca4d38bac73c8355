use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use batch_job_api::app_state::AppState;
use batch_job_api::config::AppConfig;
use batch_job_api::db::{self, JobStore, MemoryJobStore, PgJobStore};
use batch_job_api::routes;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!(env = %config.app_env, "Initializing batch job API");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe_metrics();

    // Job document store
    let store: Arc<dyn JobStore> = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to PostgreSQL document store");
            let pool = db::init_pool(database_url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Running database migrations");
            db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");

            Arc::new(PgJobStore::new(pool))
        }
        None if config.is_development() => {
            tracing::warn!("DATABASE_URL not set; using in-memory job store (development only)");
            Arc::new(MemoryJobStore::new())
        }
        None => panic!("DATABASE_URL is required outside development"),
    };

    if config.mask_dispatch_transport_failures {
        tracing::warn!("Unreachable detection server will be reported to clients as success");
    }

    tracing::info!(endpoint = %config.ai_server_endpoint, "Configuring detection server client");
    let state = AppState::with_detection_server(&config, store)
        .expect("Failed to initialize application state");

    let app = routes::router(state, config.max_body_bytes).route(
        "/metrics",
        get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
    );

    tracing::info!("Starting batch job API on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
