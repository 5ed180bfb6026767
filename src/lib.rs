//! Pixform synthesizes and transforms raster images with a small per-pixel expression language.
//!
//! An expression, written in infix (`name = expr; return expr`) or postfix (RPN) notation, is
//! compiled once into a type-checked [`Program`] and evaluated by a stack VM for every output
//! pixel. Its free variables are the pixel coordinates `x`/`y`, the geometry constants of a
//! [`Context`] and the sampling functions `getp1`..`getp3` into the input images.
//!
//! - Describe an invocation with [`TransformOpts`]
//! - Run it with [`transform`], or build a [`TransformSession`] to inspect the program first
#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod eval;
pub mod expression;
mod foundation;
pub mod render;

pub use crate::eval::context::Context;
pub use crate::expression::bytecode::{Program, ProgramFingerprint};
pub use crate::expression::error::{CompileError, CompileErrorKind};
pub use crate::expression::value::{Color, Value, ValueType};
pub use crate::expression::vm::{Frame, VmError, evaluate};
pub use crate::expression::{ExprSource, compile};
pub use crate::foundation::error::{PixformError, PixformResult};
pub use crate::render::output::OutputImage;
pub use crate::render::pipeline::{
    TransformOpts, TransformSession, transform, transform_with_cancel,
};
pub use crate::render::source::{SourceImage, sample};
