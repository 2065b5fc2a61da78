//! Local adapters: filesystem storage, process runner, raster renderer, HTTP.

pub mod command;
pub mod fs;
pub mod http;
pub mod watermark;

pub use command::TokioCommandRunner;
pub use fs::FsAdapter;
pub use watermark::CaptionedWatermark;
