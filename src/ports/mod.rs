//! Ports - Trait definitions for everything the pipeline talks to.

pub mod command;
pub mod storage;
pub mod watermark;
