//! Domain layer - the video transformation pipeline stages.

pub mod av;
pub mod concat;
pub mod encoding;
pub mod errors;
pub mod jobs;
pub mod outro;
pub mod overlay;
pub mod request;
