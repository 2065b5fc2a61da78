//! Audio/Video probing.

pub mod audio_stream;
pub mod av;
pub mod rational;
pub mod stream;
pub mod video_stream;

pub use av::{probe, MediaDescriptor};
pub use rational::Rational;
