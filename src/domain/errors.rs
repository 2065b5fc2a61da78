//! Error taxonomy for a watermarking job.

use thiserror::Error;

/// Failure of a single pipeline run.
///
/// `Input` maps to a 400-class response, every other variant to 500. The
/// payload of the stage variants is the external tool's diagnostic text, kept
/// verbatim so callers see what the encoder or storage actually said.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Input(String),
    #[error("Probe failed: {0}")]
    Probe(String),
    #[error("Watermark asset error: {0}")]
    Asset(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Outro build failed: {0}")]
    OutroBuild(String),
    #[error("Concat failed: {0}")]
    Concat(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PipelineError {
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::Input(_) => 400,
            _ => 500,
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(self, PipelineError::Input(_))
    }

    /// Human readable headline for the response body.
    pub fn message(&self) -> String {
        match self {
            PipelineError::Input(msg) => msg.clone(),
            _ => String::from("Processing failed"),
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        PipelineError::Storage(err.to_string())
    }
}
