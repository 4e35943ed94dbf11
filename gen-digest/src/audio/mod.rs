//! Audio assembly, chapter markers, and size-driven partitioning.

pub mod assembler;
pub mod chapters;
pub mod encoder;
pub mod partition;

pub use encoder::FfmpegEncoder;
