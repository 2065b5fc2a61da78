//! Vidmark - Video Watermarking Service
//!
//! Hexagonal Architecture:
//! - domain/: Pipeline stages (av probing, overlay, outro, concat, jobs)
//! - ports/: Trait definitions (storage, command runner, watermark renderer)
//! - adapters/: Concrete implementations (S3, filesystem, tokio processes, HTTP)
//! - application/: The pipeline service, generic over the ports
//! - config: Environment configuration
//!
//! # Features
//! - `aws`: S3 storage adapter and the S3-backed `vidmark` binary (default)

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports for convenience
pub use application::PipelineService;
pub use config::{PipelineConfig, ServerConfig};
pub use domain::errors::PipelineError;
pub use domain::request::WatermarkRequest;
