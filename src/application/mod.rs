//! Application layer - services generic over the ports.

pub mod pipeline;

pub use pipeline::{JobReport, JobResponse, PipelineService};
