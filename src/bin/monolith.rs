//! Monolith Binary - Local deployment backed by the filesystem
//!
//! Objects live under `STORAGE_ROOT/{bucket}/{key}`, so a source URL such as
//! `https://media.s3.amazonaws.com/in/clip.mp4` reads `STORAGE_ROOT/media/in/clip.mp4`.

use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vidmark::adapters::local::{http, CaptionedWatermark, FsAdapter, TokioCommandRunner};
use vidmark::{PipelineConfig, PipelineService, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::from_env()?;
    let server = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let storage = FsAdapter::new(server.storage_root.clone());
    let renderer = CaptionedWatermark::from_config(&config);
    let service = Arc::new(PipelineService::new(
        storage,
        TokioCommandRunner::new(),
        renderer,
        Arc::new(config),
    ));

    let app = http::router(service);
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", server.addr, server.port)).await?;
    tracing::info!(
        storage_root = %server.storage_root.display(),
        "Listening at {}:{}",
        server.addr,
        server.port
    );
    axum::serve(listener, app).await?;
    Ok(())
}
