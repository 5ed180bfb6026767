use crate::expression::ast::{BinaryOp, Expr, ExprKind, Script, UnaryOp};
use crate::expression::builtins::{Builtin, sample_index};
use crate::expression::typecheck::{Word, WordKind};
use crate::expression::error::{CompileError, CompileErrorKind};
use std::collections::HashSet;

/// Desugar an infix script into the postfix word stream the RPN reader would produce.
///
/// An identifier assigned by an earlier statement becomes a register load; any other
/// identifier is left for the back end to resolve as an ambient name or constant.
pub(crate) fn lower_script(script: &Script) -> Result<Vec<Word>, CompileError> {
    let mut l = Lowerer {
        out: Vec::new(),
        assigned: HashSet::new(),
    };
    for a in &script.assigns {
        l.expr(&a.value)?;
        l.out.push(Word {
            kind: WordKind::Store(a.name.clone()),
            offset: a.offset,
        });
        l.assigned.insert(a.name.as_str());
    }
    l.expr(&script.ret)?;
    Ok(l.out)
}

struct Lowerer<'a> {
    out: Vec<Word>,
    assigned: HashSet<&'a str>,
}

impl<'a> Lowerer<'a> {
    fn word(&mut self, kind: WordKind, offset: usize) {
        self.out.push(Word { kind, offset });
    }

    fn expr(&mut self, e: &'a Expr) -> Result<(), CompileError> {
        match &e.kind {
            ExprKind::Num(v) => self.word(WordKind::Number(*v), e.offset),
            ExprKind::Ident(name) => {
                let kind = if self.assigned.contains(name.as_str()) {
                    WordKind::Load(name.clone())
                } else {
                    WordKind::Name(name.clone())
                };
                self.word(kind, e.offset);
            }
            ExprKind::Unary { op, expr } => {
                self.expr(expr)?;
                let b = match op {
                    UnaryOp::Neg => Builtin::Neg,
                    UnaryOp::Not => Builtin::Not,
                };
                self.word(WordKind::Op(b), e.offset);
            }
            ExprKind::Binary { op, left, right } => {
                self.expr(left)?;
                self.expr(right)?;
                self.word(WordKind::Op(binary_builtin(*op)), e.offset);
            }
            ExprKind::Call { func, args } => {
                for a in args {
                    self.expr(a)?;
                }
                let (kind, arity) = if let Some(n) = sample_index(func) {
                    (WordKind::Sample(n), 2)
                } else if let Some(b) = Builtin::lookup(func) {
                    (WordKind::Op(b), b.arity())
                } else {
                    return Err(CompileError::new(
                        e.offset,
                        CompileErrorKind::UnknownFunction,
                        format!("unknown function '{func}'"),
                    ));
                };
                if args.len() != arity {
                    return Err(CompileError::new(
                        e.offset,
                        CompileErrorKind::Arity,
                        format!("'{func}' takes {arity} argument(s), {} given", args.len()),
                    ));
                }
                self.word(kind, e.offset);
            }
        }
        Ok(())
    }
}

fn binary_builtin(op: BinaryOp) -> Builtin {
    match op {
        BinaryOp::Add => Builtin::Add,
        BinaryOp::Sub => Builtin::Sub,
        BinaryOp::Mul => Builtin::Mul,
        BinaryOp::Div => Builtin::Div,
        BinaryOp::Mod => Builtin::Mod,
        BinaryOp::Pow => Builtin::Pow,
        BinaryOp::Eq => Builtin::Eq,
        BinaryOp::Ne => Builtin::Ne,
        BinaryOp::Lt => Builtin::Lt,
        BinaryOp::Le => Builtin::Le,
        BinaryOp::Gt => Builtin::Gt,
        BinaryOp::Ge => Builtin::Ge,
        BinaryOp::And => Builtin::And,
        BinaryOp::Or => Builtin::Or,
    }
}
