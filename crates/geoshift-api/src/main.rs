use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use geoshift_store::ArtifactStore;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use geoshift_api::{create_router, ApiConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geoshift_api=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ApiConfig::from_env().context("Failed to load configuration")?;

    for (key, (value, source)) in config.service.to_inspection_map() {
        tracing::debug!(key = %key, value = %value, source = ?source, "Configuration value");
    }

    tracing::info!(
        port = config.port,
        storage_root = %config.storage_root().display(),
        reaper_delay_secs = config.reaper_delay().as_secs(),
        retention_secs = config.retention().as_secs(),
        "Starting geoshift API server"
    );

    let store = ArtifactStore::open(config.storage_root())
        .with_context(|| format!("Failed to open storage root {}", config.storage_root().display()))?;
    let state = Arc::new(AppState::new(store, config.reaper_delay()).with_retention(config.retention()));

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin '{}'", config.cors_origin))?,
        )
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let app = create_router(state, config.max_upload_bytes()).layer(cors);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on {}", addr);
    tracing::info!("CORS enabled for {}", config.cors_origin);

    axum::serve(listener, app).await?;
    Ok(())
}
