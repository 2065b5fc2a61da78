//! S3-backed watermarking service.
//!
//! Wires up:
//! - S3 storage adapter (credentials and region from the AWS environment)
//! - ffmpeg/ffprobe through the tokio process runner
//! - Captioned watermark renderer
//! - HTTP inbound adapter

use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vidmark::adapters::aws::S3Adapter;
use vidmark::adapters::local::{http, CaptionedWatermark, TokioCommandRunner};
use vidmark::{PipelineConfig, PipelineService, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::from_env()?;
    let server = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1. Adapters
    let storage = S3Adapter::from_env().await;
    let renderer = CaptionedWatermark::from_config(&config);

    // 2. Application Service
    let service = Arc::new(PipelineService::new(
        storage,
        TokioCommandRunner::new(),
        renderer,
        Arc::new(config),
    ));

    // 3. HTTP Layer
    let app = http::router(service);
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", server.addr, server.port)).await?;
    tracing::info!("Listening at {}:{}", server.addr, server.port);
    axum::serve(listener, app).await?;
    Ok(())
}
