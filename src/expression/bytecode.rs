use crate::expression::builtins::Builtin;
use crate::expression::value::ValueType;
use xxhash_rust::xxh3::Xxh3;

const XXH3_SEED: u64 = 0x5f1c_83a2_9d4e_07b6;

/// Index into [`Program::literals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LitIdx(pub u32);

/// Index into the [`crate::Context`] constant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstIdx(pub u32);

/// Dense register slot, assigned in order of first store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegIdx(pub u32);

/// One compiled operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    /// Push a numeric literal.
    PushLit(LitIdx),
    /// Push the ambient `x` coordinate.
    LoadX,
    /// Push the ambient `y` coordinate.
    LoadY,
    /// Push a context constant.
    LoadConst(ConstIdx),
    /// Push a copy of a register.
    LoadReg(RegIdx),
    /// Pop one value into a register.
    StoreReg(RegIdx),
    /// Pop the builtin's arity, push its result.
    Call(Builtin),
    /// Pop `(x, y)`, push the color of input image `n` (0-based) at that position.
    Sample(u8),
}

/// An operation with its statically known result type.
///
/// For [`Op::StoreReg`] the type is that of the stored value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instr {
    /// The operation.
    pub op: Op,
    /// Type pushed (or stored).
    pub ty: ValueType,
}

/// Stable digest of a compiled program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramFingerprint {
    /// High 64 bits.
    pub hi: u64,
    /// Low 64 bits.
    pub lo: u64,
}

/// A type-checked instruction sequence, compiled once and shared read-only by every pixel.
#[derive(Debug, Clone)]
pub struct Program {
    pub(crate) instrs: Vec<Instr>,
    pub(crate) literals: Vec<f64>,
    pub(crate) register_names: Vec<String>,
    pub(crate) arity: u8,
    pub(crate) result: ValueType,
}

impl Program {
    pub(crate) fn new() -> Self {
        Self {
            instrs: Vec::new(),
            literals: Vec::new(),
            register_names: Vec::new(),
            arity: 0,
            result: ValueType::Color,
        }
    }

    pub(crate) fn push_literal(&mut self, v: f64) -> LitIdx {
        let idx = LitIdx(self.literals.len() as u32);
        self.literals.push(v);
        idx
    }

    /// The instruction sequence.
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    /// Number of input images referenced (highest `getpN`).
    pub fn arity(&self) -> usize {
        usize::from(self.arity)
    }

    /// Number of register slots an evaluation frame needs.
    pub fn register_count(&self) -> usize {
        self.register_names.len()
    }

    /// Source name of a register slot.
    pub fn register_name(&self, r: RegIdx) -> &str {
        self.register_names
            .get(r.0 as usize)
            .map(String::as_str)
            .unwrap_or("?")
    }

    /// Type left on the stack by the final instruction; a number is widened to grey.
    pub fn result_type(&self) -> ValueType {
        self.result
    }

    /// Digest of instructions, literals and register layout.
    pub fn fingerprint(&self) -> ProgramFingerprint {
        let mut h = Xxh3::with_seed(XXH3_SEED);
        for instr in &self.instrs {
            match instr.op {
                Op::PushLit(i) => {
                    h.update(&[0]);
                    h.update(&self.literals[i.0 as usize].to_bits().to_le_bytes());
                }
                Op::LoadX => h.update(&[1]),
                Op::LoadY => h.update(&[2]),
                Op::LoadConst(c) => {
                    h.update(&[3]);
                    h.update(&c.0.to_le_bytes());
                }
                Op::LoadReg(r) => {
                    h.update(&[4]);
                    h.update(&r.0.to_le_bytes());
                }
                Op::StoreReg(r) => {
                    h.update(&[5]);
                    h.update(&r.0.to_le_bytes());
                }
                Op::Call(b) => h.update(&[6, b as u8]),
                Op::Sample(n) => h.update(&[7, n]),
            }
            h.update(&[instr.ty as u8]);
        }
        h.update(&[self.arity, self.result as u8]);
        let v = h.digest128();
        ProgramFingerprint {
            hi: (v >> 64) as u64,
            lo: v as u64,
        }
    }
}

impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (pc, instr) in self.instrs.iter().enumerate() {
            write!(f, "{pc:4}  ")?;
            match instr.op {
                Op::PushLit(i) => write!(f, "push    {}", self.literals[i.0 as usize])?,
                Op::LoadX => f.write_str("load    x")?,
                Op::LoadY => f.write_str("load    y")?,
                Op::LoadConst(c) => write!(f, "const   #{}", c.0)?,
                Op::LoadReg(r) => write!(f, "load    @{}", self.register_name(r))?,
                Op::StoreReg(r) => write!(f, "store   !{}", self.register_name(r))?,
                Op::Call(b) => write!(f, "call    {}/{}", b.name(), b.arity())?,
                Op::Sample(n) => write!(f, "sample  getp{}", n + 1)?,
            }
            writeln!(f, "  : {}", instr.ty)?;
        }
        Ok(())
    }
}
