/// Category of a compilation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// Unrecognised character or malformed literal.
    Lex,
    /// Grammar violation in the infix front end.
    Syntax,
    /// Reference to a name that is neither ambient, a constant nor an assigned register.
    UnknownIdentifier,
    /// RPN word or call target that is not a known operator or function.
    UnknownFunction,
    /// Too few operands on the stack, or a call with the wrong argument count.
    Arity,
    /// Operand types match none of the operator's signatures.
    TypeMismatch,
    /// The program does not leave exactly one color-convertible value.
    ResultShape,
    /// Store to an ambient coordinate, a constant or a builtin name.
    ReservedName,
    /// Register load with no preceding store.
    UnboundRegister,
    /// `getpN` refers to an image that was not supplied.
    MissingImage,
}

/// A compilation failure located at a byte offset of the source text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("at byte {offset}: {message}")]
pub struct CompileError {
    /// Byte offset of the offending token.
    pub offset: usize,
    /// Failure category.
    pub kind: CompileErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl CompileError {
    pub(crate) fn new(offset: usize, kind: CompileErrorKind, message: impl Into<String>) -> Self {
        Self {
            offset,
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::new(offset, CompileErrorKind::Syntax, message)
    }

    pub(crate) fn lex(offset: usize, message: impl Into<String>) -> Self {
        Self::new(offset, CompileErrorKind::Lex, message)
    }
}
