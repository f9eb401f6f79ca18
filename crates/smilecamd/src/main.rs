use anyhow::{Context, Result};
use smilecam_core::SmileDetector;
use smilecam_hw::V4lCameraProvider;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod capture;
mod config;
mod error;
mod routes;
mod smile;
mod state;
mod store;

const DEFAULT_LOG_FILTER: &str =
    "smilecamd=info,smilecam_core=info,smilecam_hw=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("smilecamd v{} starting", env!("CARGO_PKG_VERSION"));

    let config = config::Config::from_env();
    tracing::info!(
        device = %config.camera_device,
        width = config.frame_width,
        height = config.frame_height,
        db = %config.db_path.display(),
        save_dir = %config.save_dir.display(),
        cascades = %config.cascade_dir.display(),
        "configuration loaded"
    );

    let detector = SmileDetector::load(&config.cascade_dir)
        .with_context(|| format!("loading cascades from {}", config.cascade_dir.display()))?;

    let store = store::EventStore::initialize(&config.db_path)
        .with_context(|| format!("initializing {}", config.db_path.display()))?;

    std::fs::create_dir_all(&config.save_dir)
        .with_context(|| format!("creating {}", config.save_dir.display()))?;

    let camera = Arc::new(V4lCameraProvider::new(
        config.camera_device.clone(),
        config.frame_width,
        config.frame_height,
    ));

    let state = state::AppState::new(
        camera,
        detector,
        store,
        config.save_dir.clone(),
        config.capture_interval,
        config.jpeg_quality,
    );
    let capture = state.capture.clone();
    let app = routes::create_router(state);

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "smilecamd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("smilecamd shutting down");
        })
        .await?;

    tokio::task::spawn_blocking(move || capture.stop()).await?;
    Ok(())
}
