//! Expression language: two front ends, one type-checking back end, one stack VM.
//!
//! Infix source is parsed and lowered to the same postfix word stream the RPN reader produces;
//! [`compile`] then type-checks that stream against a [`Context`] and emits a [`Program`].

use crate::eval::context::Context;

pub(crate) mod ast;
/// The fixed operator table.
pub mod builtins;
/// Compiled program representation.
pub mod bytecode;
/// Compile errors.
pub mod error;
pub(crate) mod lexer;
pub(crate) mod lower;
pub(crate) mod parser;
pub(crate) mod rpn;
pub(crate) mod typecheck;
pub mod value;
/// Per-pixel interpreter.
pub mod vm;

use bytecode::Program;
use error::CompileError;

/// Source text in one of the two notations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprSource<'a> {
    /// `name = expr;` statements followed by `return expr`.
    Infix(&'a str),
    /// Whitespace-separated postfix words.
    Rpn(&'a str),
}

impl ExprSource<'_> {
    /// The raw source text.
    pub fn text(&self) -> &str {
        match self {
            Self::Infix(s) | Self::Rpn(s) => s,
        }
    }
}

/// Compile `src` against `ctx`. No partial program is ever returned.
#[tracing::instrument(skip(ctx), fields(len = src.text().len()))]
pub fn compile(src: &ExprSource<'_>, ctx: &Context) -> Result<Program, CompileError> {
    let words = match src {
        ExprSource::Infix(s) => lower::lower_script(&parser::parse_script(s)?)?,
        ExprSource::Rpn(s) => rpn::read_rpn(s)?,
    };
    let program = typecheck::compile_words(&words, ctx, src.text().len())?;
    let fp = program.fingerprint();
    tracing::debug!(
        instrs = program.instrs().len(),
        registers = program.register_count(),
        arity = program.arity(),
        fingerprint = format_args!("{:016x}{:016x}", fp.hi, fp.lo),
        "compiled expression"
    );
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::error::CompileErrorKind;
    use std::collections::BTreeMap;

    fn ctx(images: usize) -> Context {
        Context::build(8, 8, &vec![(4, 4); images], &BTreeMap::new()).unwrap()
    }

    #[test]
    fn both_notations_compile_to_the_same_program() {
        let c = ctx(1);
        let infix = compile(
            &ExprSource::Infix(
                "pix = getp1(x, y);\n\
                 return ifp(value(pix) > 0.96 && sat(pix) < 0.1, rgb(128, 128, 255), pix);",
            ),
            &c,
        )
        .unwrap();
        let rpn = compile(
            &ExprSource::Rpn(
                "x y getp1 !pix @pix value 0.96 > @pix sat 0.1 < && 128 128 255 rgb @pix ifp",
            ),
            &c,
        )
        .unwrap();
        assert_eq!(infix.instrs(), rpn.instrs());
        assert_eq!(infix.fingerprint(), rpn.fingerprint());
        assert_eq!(infix.arity(), 1);
    }

    #[test]
    fn unbound_register_is_rejected_in_both_notations() {
        let c = ctx(0);
        let err = compile(&ExprSource::Rpn("@ghost"), &c).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::UnboundRegister);
        // In infix an unassigned name is an unknown identifier.
        let err = compile(&ExprSource::Infix("return ghost;"), &c).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::UnknownIdentifier);
    }

    #[test]
    fn result_shape_errors_point_at_end_of_input() {
        let src = "1 2";
        let err = compile(&ExprSource::Rpn(src), &ctx(0)).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::ResultShape);
        assert_eq!(err.offset, src.len());
    }

    #[test]
    fn disassembly_lists_each_instruction() {
        let p = compile(&ExprSource::Infix("g = x * 2; return rgb(g, g, w)"), &ctx(0)).unwrap();
        let text = p.to_string();
        assert_eq!(text.lines().count(), p.instrs().len());
        assert!(text.contains("store   !g"));
        assert!(text.contains("call    rgb/3"));
    }
}
