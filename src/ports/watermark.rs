use crate::domain::errors::PipelineError;
use std::path::Path;

/// Pixel size of a rendered watermark raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterSize {
    pub width: u32,
    pub height: u32,
}

/// Renders the per-identity watermark raster the overlay burns in.
#[cfg_attr(test, mockall::automock)]
pub trait WatermarkRenderer: Send + Sync {
    fn render(&self, identity: &str, output: &Path) -> Result<RasterSize, PipelineError>;
}
