use crate::eval::context::Context;
use crate::expression::builtins::{Builtin, sample_index};
use crate::expression::bytecode::{Instr, Op, Program, RegIdx};
use crate::expression::error::{CompileError, CompileErrorKind};
use crate::expression::value::ValueType;
use std::collections::HashMap;

/// One postfix item. Both front ends produce a sequence of these; this module is the only
/// place that turns them into instructions.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Word {
    pub(crate) kind: WordKind,
    pub(crate) offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WordKind {
    Number(f64),
    /// Ambient coordinate or context constant.
    Name(String),
    Load(String),
    Store(String),
    Op(Builtin),
    /// 0-based input image index.
    Sample(u8),
}

/// `true` for names a register may never take.
pub(crate) fn is_reserved(name: &str, ctx: &Context) -> bool {
    matches!(name, "x" | "y") || ctx.lookup(name).is_some() || Builtin::is_reserved_word(name)
}

struct Checker<'a> {
    ctx: &'a Context,
    program: Program,
    types: Vec<ValueType>,
    slots: HashMap<String, RegIdx>,
    // Flow-sensitive: type of the most recent store per slot.
    slot_types: Vec<ValueType>,
}

/// Type-check `words` against `ctx` and emit the program.
///
/// `end_offset` locates errors about the final stack shape.
pub(crate) fn compile_words(
    words: &[Word],
    ctx: &Context,
    end_offset: usize,
) -> Result<Program, CompileError> {
    let mut c = Checker {
        ctx,
        program: Program::new(),
        types: Vec::with_capacity(16),
        slots: HashMap::new(),
        slot_types: Vec::new(),
    };
    for w in words {
        c.word(w)?;
    }
    c.finish(end_offset)
}

impl Checker<'_> {
    fn emit(&mut self, op: Op, ty: ValueType) {
        self.program.instrs.push(Instr { op, ty });
    }

    fn push(&mut self, op: Op, ty: ValueType) {
        self.types.push(ty);
        self.emit(op, ty);
    }

    fn word(&mut self, w: &Word) -> Result<(), CompileError> {
        match &w.kind {
            WordKind::Number(v) => {
                let idx = self.program.push_literal(*v);
                self.push(Op::PushLit(idx), ValueType::Number);
            }
            WordKind::Name(name) => {
                let op = match name.as_str() {
                    "x" => Op::LoadX,
                    "y" => Op::LoadY,
                    _ => match self.ctx.lookup(name) {
                        Some(idx) => Op::LoadConst(idx),
                        None => return Err(unknown_name(name, w.offset)),
                    },
                };
                self.push(op, ValueType::Number);
            }
            WordKind::Load(name) => {
                let Some(&slot) = self.slots.get(name) else {
                    if is_reserved(name, self.ctx) {
                        return Err(CompileError::new(
                            w.offset,
                            CompileErrorKind::ReservedName,
                            format!("'{name}' is not a register"),
                        ));
                    }
                    return Err(CompileError::new(
                        w.offset,
                        CompileErrorKind::UnboundRegister,
                        format!("register '{name}' is read before it is stored"),
                    ));
                };
                let ty = self.slot_types[slot.0 as usize];
                self.push(Op::LoadReg(slot), ty);
            }
            WordKind::Store(name) => {
                if is_reserved(name, self.ctx) {
                    return Err(CompileError::new(
                        w.offset,
                        CompileErrorKind::ReservedName,
                        format!("cannot assign to reserved name '{name}'"),
                    ));
                }
                let Some(ty) = self.types.pop() else {
                    return Err(CompileError::new(
                        w.offset,
                        CompileErrorKind::Arity,
                        format!("store to '{name}' with an empty stack"),
                    ));
                };
                let slot = match self.slots.get(name) {
                    Some(&slot) => {
                        self.slot_types[slot.0 as usize] = ty;
                        slot
                    }
                    None => {
                        let slot = RegIdx(self.program.register_names.len() as u32);
                        self.program.register_names.push(name.clone());
                        self.slot_types.push(ty);
                        self.slots.insert(name.clone(), slot);
                        slot
                    }
                };
                self.emit(Op::StoreReg(slot), ty);
            }
            WordKind::Op(b) => {
                let ret = self.operands(b.name(), b.arity(), w.offset, |args| b.resolve(args))?;
                self.push(Op::Call(*b), ret);
            }
            WordKind::Sample(n) => {
                let name = format!("getp{}", n + 1);
                let images = self.ctx.image_count();
                if usize::from(*n) >= images {
                    return Err(CompileError::new(
                        w.offset,
                        CompileErrorKind::MissingImage,
                        format!(
                            "'{name}' needs at least {} input image(s), {images} supplied",
                            n + 1
                        ),
                    ));
                }
                let ret = self.operands(&name, 2, w.offset, |args| {
                    (args == [ValueType::Number, ValueType::Number]).then_some(ValueType::Color)
                })?;
                self.program.arity = self.program.arity.max(n + 1);
                self.push(Op::Sample(*n), ret);
            }
        }
        Ok(())
    }

    /// Pop `arity` operand types and resolve the result type.
    fn operands(
        &mut self,
        name: &str,
        arity: usize,
        offset: usize,
        resolve: impl FnOnce(&[ValueType]) -> Option<ValueType>,
    ) -> Result<ValueType, CompileError> {
        let depth = self.types.len();
        if depth < arity {
            return Err(CompileError::new(
                offset,
                CompileErrorKind::Arity,
                format!("'{name}' needs {arity} operand(s), found {depth}"),
            ));
        }
        let base = depth - arity;
        let Some(ret) = resolve(&self.types[base..]) else {
            let got = self.types[base..]
                .iter()
                .map(|t| t.name())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(CompileError::new(
                offset,
                CompileErrorKind::TypeMismatch,
                format!("'{name}' is not defined for ({got})"),
            ));
        };
        self.types.truncate(base);
        Ok(ret)
    }

    fn finish(mut self, end_offset: usize) -> Result<Program, CompileError> {
        match self.types.as_slice() {
            [ty] => {
                self.program.result = *ty;
                Ok(self.program)
            }
            rest => Err(CompileError::new(
                end_offset,
                CompileErrorKind::ResultShape,
                format!(
                    "program leaves {} value(s) on the stack, expected exactly one color",
                    rest.len()
                ),
            )),
        }
    }
}

fn unknown_name(name: &str, offset: usize) -> CompileError {
    if Builtin::lookup(name).is_some() || sample_index(name).is_some() {
        return CompileError::new(
            offset,
            CompileErrorKind::UnknownIdentifier,
            format!("'{name}' is a function and must be called"),
        );
    }
    CompileError::new(
        offset,
        CompileErrorKind::UnknownIdentifier,
        format!("unknown identifier '{name}'"),
    )
}
