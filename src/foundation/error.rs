use crate::expression::error::CompileError;
use crate::expression::vm::VmError;

/// Crate-wide result alias.
pub type PixformResult<T> = Result<T, PixformError>;

/// Top-level failure of a transform invocation.
///
/// No variant is ever accompanied by a partial output image.
#[derive(thiserror::Error, Debug)]
pub enum PixformError {
    /// Conflicting or missing options, rejected before compilation.
    #[error("usage error: {0}")]
    Usage(String),

    /// The expression source failed to lex, parse or type-check.
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    /// The compiled program was internally inconsistent during execution.
    #[error("runtime error: {0}")]
    Runtime(#[from] VmError),

    /// The caller raised the cancellation flag between rows.
    #[error("transform cancelled")]
    Cancelled,

    /// Any other failure (thread pool construction, ...).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PixformError {
    /// Build a [`PixformError::Usage`].
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Return `true` for errors caused by the caller's options rather than the expression.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::error::CompileErrorKind;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            PixformError::usage("x")
                .to_string()
                .contains("usage error:")
        );
        let c = CompileError::new(3, CompileErrorKind::Syntax, "boom");
        assert!(PixformError::from(c).to_string().contains("compile error:"));
        let r = VmError::StackShape {
            message: "two values".to_owned(),
        };
        assert!(PixformError::from(r).to_string().contains("runtime error:"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = PixformError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
        assert!(!err.is_usage());
    }
}
