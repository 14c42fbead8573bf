use anyhow::Context;
use axum::{Router, response::IntoResponse, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use pathslides_server::config::Config;
use pathslides_server::db::{self, Backend};
use pathslides_server::server::{AppState, build_router};
use pathslides_server::slide::{ImagingStore, SqlImagingStore};
use pathslides_server::users::StaticDirectory;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prometheus metrics handle for exposing metrics in Prometheus format
static PROMETHEUS_HANDLE: std::sync::OnceLock<PrometheusHandle> = std::sync::OnceLock::new();

/// Endpoint to expose metrics in Prometheus format
async fn prometheus_metrics() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => handle.render(),
        None => String::new(),
    }
}

/// Refresh the uptime gauge (called periodically)
fn update_gauge_metrics(state: &AppState) {
    metrics::gauge!("pathslides_uptime_seconds").set(state.uptime_seconds() as f64);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize Prometheus metrics recorder (must be done before any metrics are recorded)
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    PROMETHEUS_HANDLE.set(prometheus_handle).ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pathslides=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        "Loaded configuration: host={}, port={}",
        config.host, config.port
    );

    let primary_url = config
        .database
        .primary_url
        .clone()
        .context("Primary database URL not configured (PRIMARY_DATABASE_URL or POSTGRES_* secrets)")?;
    let imaging_url = config
        .database
        .imaging_url
        .clone()
        .context("Imaging database URL not configured (IMAGING_DATABASE_URL)")?;

    // Primary store: study sets, collections, users
    let primary = db::connect(&primary_url, config.database.max_connections)
        .await
        .context("Failed to connect to primary database")?;
    if config.database.auto_migrate {
        match Backend::from_url(&primary_url) {
            Some(backend) => db::migrate_primary(&primary, backend)
                .await
                .context("Failed to create primary schema")?,
            None => warn!("Unknown primary database backend; skipping schema bootstrap"),
        }
    }

    // Imaging store: read-only slide metadata
    let imaging_pool = db::connect(&imaging_url, config.database.max_connections)
        .await
        .context("Failed to connect to imaging database")?;
    let imaging: Arc<dyn ImagingStore> = Arc::new(
        SqlImagingStore::new(imaging_pool)
            .with_core_schema(config.database.imaging_core_schema.as_deref()),
    );
    if let Some(ref schema) = config.database.imaging_core_schema {
        info!("Imaging core tables qualified with schema {}", schema);
    }

    let directory = Arc::new(StaticDirectory::new(
        config.directory.allowed_users.clone(),
    ));
    if config.directory.allowed_users.is_none() {
        warn!("DIRECTORY_ALLOWED_USERS not set; any username can be added");
    }

    let app_state = AppState::new(primary, imaging, directory, &config.collections);

    // Periodic update of gauge metrics (every 5 seconds)
    let gauge_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));
        loop {
            interval.tick().await;
            update_gauge_metrics(&gauge_state);
        }
    });

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/metrics/prometheus", get(prometheus_metrics))
        .merge(build_router(app_state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Add static file serving if configured
    let app = if let Some(ref static_dir) = config.static_files.dir {
        if static_dir.exists() {
            info!("Serving static files from: {:?}", static_dir);

            // ServeDir with SPA fallback: serve index.html for any unmatched routes
            let index_path = static_dir.join("index.html");
            let serve_dir =
                ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_path));

            // Add compression layer for static files (gzip)
            let static_service = ServiceBuilder::new()
                .layer(CompressionLayer::new())
                .service(serve_dir);

            app.fallback_service(static_service)
        } else {
            warn!(
                "Static files directory not found: {:?} - static file serving disabled",
                static_dir
            );
            app
        }
    } else {
        info!("Static file serving disabled (STATIC_FILES_DIR not set)");
        app
    };

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("PathSlides server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
