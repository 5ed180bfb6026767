//! Pixel I/O and the row-parallel driver.

/// Packed output buffers.
pub mod output;
/// The orchestrator.
pub mod pipeline;
/// Input image access and sampling.
pub mod source;
