//! Per-invocation evaluation state shared by every pixel.

/// Context builder.
pub mod context;
