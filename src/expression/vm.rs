use crate::eval::context::Context;
use crate::expression::builtins::Builtin;
use crate::expression::bytecode::{Op, Program};
use crate::expression::value::{self, Color, HUGE, Value, from_bool, saturate, truthy};
use crate::render::source::{SourceImage, sample};

/// Execution failure. Any of these means the compiled program is internally inconsistent.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum VmError {
    /// A register was read before any store in this evaluation.
    #[error("register '{name}' (slot {slot}) read before any store")]
    UnboundRegister {
        /// Register slot.
        slot: u32,
        /// Source name of the register.
        name: String,
    },
    /// Underflow, or not exactly one value left at the end.
    #[error("stack shape violation: {message}")]
    StackShape {
        /// What went wrong.
        message: String,
    },
    /// An operand had a type no signature of the operator accepts.
    #[error("type mismatch in '{op}': {message}")]
    TypeMismatch {
        /// Operator name.
        op: &'static str,
        /// Offending operand description.
        message: String,
    },
    /// `getpN` executed with fewer than N images bound.
    #[error("input image {index} is not bound")]
    MissingImage {
        /// 1-based image number.
        index: usize,
    },
}

/// Transient per-pixel state: value stack and register slots.
///
/// A worker may keep one frame for all the pixels it owns; [`evaluate_in`] resets it before each
/// pixel, so no value ever crosses from one pixel to the next.
#[derive(Debug, Clone)]
pub struct Frame {
    stack: Vec<Value>,
    regs: Vec<Option<Value>>,
}

impl Frame {
    /// Allocate a frame sized for `program`.
    pub fn new(program: &Program) -> Self {
        Self {
            stack: Vec::with_capacity(16),
            regs: vec![None; program.register_count()],
        }
    }

    /// Empty the stack and unbind every register.
    pub fn reset(&mut self, register_count: usize) {
        self.stack.clear();
        self.regs.clear();
        self.regs.resize(register_count, None);
    }
}

/// Evaluate `program` for the pixel `(x, y)` in a fresh frame.
pub fn evaluate(
    program: &Program,
    ctx: &Context,
    x: f64,
    y: f64,
    images: &[&dyn SourceImage],
) -> Result<Color, VmError> {
    let mut frame = Frame::new(program);
    evaluate_in(&mut frame, program, ctx, x, y, images)
}

/// Evaluate `program` for the pixel `(x, y)`, reusing `frame`'s allocations.
pub fn evaluate_in(
    frame: &mut Frame,
    program: &Program,
    ctx: &Context,
    x: f64,
    y: f64,
    images: &[&dyn SourceImage],
) -> Result<Color, VmError> {
    frame.reset(program.register_count());
    let stack = &mut frame.stack;

    for instr in &program.instrs {
        match instr.op {
            Op::PushLit(idx) => {
                let v = program
                    .literals
                    .get(idx.0 as usize)
                    .copied()
                    .ok_or_else(|| stack_shape("literal index out of range"))?;
                stack.push(Value::Number(v));
            }
            Op::LoadX => stack.push(Value::Number(x)),
            Op::LoadY => stack.push(Value::Number(y)),
            Op::LoadConst(idx) => {
                let v = ctx
                    .value(idx)
                    .ok_or_else(|| stack_shape("constant index out of range"))?;
                stack.push(Value::Number(v));
            }
            Op::LoadReg(r) => {
                let v = frame
                    .regs
                    .get(r.0 as usize)
                    .copied()
                    .flatten()
                    .ok_or_else(|| VmError::UnboundRegister {
                        slot: r.0,
                        name: program.register_name(r).to_owned(),
                    })?;
                stack.push(v);
            }
            Op::StoreReg(r) => {
                let v = stack
                    .pop()
                    .ok_or_else(|| stack_shape("store with an empty stack"))?;
                let slot = frame
                    .regs
                    .get_mut(r.0 as usize)
                    .ok_or_else(|| stack_shape("register slot out of range"))?;
                *slot = Some(v);
            }
            Op::Call(b) => call_builtin(stack, b)?,
            Op::Sample(n) => {
                let img = images
                    .get(usize::from(n))
                    .ok_or_else(|| VmError::MissingImage {
                        index: usize::from(n) + 1,
                    })?;
                let sy = pop_number(stack, "getp")?;
                let sx = pop_number(stack, "getp")?;
                stack.push(Value::Color(sample(*img, sx, sy)));
            }
        }
    }

    if stack.len() != 1 {
        return Err(stack_shape(format!(
            "stack has {} values at end of program",
            stack.len()
        )));
    }
    match stack.pop() {
        Some(Value::Color(c)) => Ok(c),
        Some(Value::Number(n)) => Ok(Color::grey(n)),
        None => Err(stack_shape("empty stack at end of program")),
    }
}

fn stack_shape(message: impl Into<String>) -> VmError {
    VmError::StackShape {
        message: message.into(),
    }
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, VmError> {
    stack.pop().ok_or_else(|| stack_shape("stack underflow"))
}

fn pop_number(stack: &mut Vec<Value>, op: &'static str) -> Result<f64, VmError> {
    match pop(stack)? {
        Value::Number(v) => Ok(v),
        Value::Color(_) => Err(VmError::TypeMismatch {
            op,
            message: "expected number, got color".to_owned(),
        }),
    }
}

fn pop_color(stack: &mut Vec<Value>, op: &'static str) -> Result<Color, VmError> {
    match pop(stack)? {
        Value::Color(c) => Ok(c),
        Value::Number(_) => Err(VmError::TypeMismatch {
            op,
            message: "expected color, got number".to_owned(),
        }),
    }
}

/// Pop `N` numbers, returned in push order.
fn pop_numbers<const N: usize>(
    stack: &mut Vec<Value>,
    op: &'static str,
) -> Result<[f64; N], VmError> {
    let mut out = [0.0; N];
    for slot in out.iter_mut().rev() {
        *slot = pop_number(stack, op)?;
    }
    Ok(out)
}

fn unary(
    stack: &mut Vec<Value>,
    op: &'static str,
    f: impl FnOnce(f64) -> f64,
) -> Result<(), VmError> {
    let [a] = pop_numbers::<1>(stack, op)?;
    stack.push(Value::Number(saturate(f(a))));
    Ok(())
}

fn binary(
    stack: &mut Vec<Value>,
    op: &'static str,
    f: impl FnOnce(f64, f64) -> f64,
) -> Result<(), VmError> {
    let [a, b] = pop_numbers::<2>(stack, op)?;
    stack.push(Value::Number(saturate(f(a, b))));
    Ok(())
}

/// `+ - *`: number-number, or per-channel on two colors.
fn arith(stack: &mut Vec<Value>, op: &'static str, f: fn(f64, f64) -> f64) -> Result<(), VmError> {
    let b = pop(stack)?;
    let a = pop(stack)?;
    let out = match (a, b) {
        (Value::Number(a), Value::Number(b)) => Value::Number(saturate(f(a, b))),
        (Value::Color(a), Value::Color(b)) => Value::Color(a.zip_with(b, f)),
        (a, b) => {
            return Err(VmError::TypeMismatch {
                op,
                message: format!("mixed operands {} and {}", a.ty(), b.ty()),
            });
        }
    };
    stack.push(out);
    Ok(())
}

fn call_builtin(stack: &mut Vec<Value>, b: Builtin) -> Result<(), VmError> {
    let name = b.name();
    match b {
        Builtin::Add => arith(stack, name, |a, b| a + b)?,
        Builtin::Sub => arith(stack, name, |a, b| a - b)?,
        Builtin::Mul => arith(stack, name, |a, b| a * b)?,
        Builtin::Div => binary(stack, name, value::div)?,
        Builtin::Mod => binary(stack, name, value::fmod)?,
        Builtin::Pow => binary(stack, name, value::pow)?,
        Builtin::Neg => unary(stack, name, |a| -a)?,

        Builtin::Eq => binary(stack, name, |a, b| from_bool(value::approx_eq(a, b)))?,
        Builtin::Ne => binary(stack, name, |a, b| from_bool(!value::approx_eq(a, b)))?,
        Builtin::Lt => binary(stack, name, |a, b| from_bool(a < b))?,
        Builtin::Gt => binary(stack, name, |a, b| from_bool(a > b))?,
        Builtin::Le => binary(stack, name, |a, b| {
            from_bool(a < b || value::approx_eq(a, b))
        })?,
        Builtin::Ge => binary(stack, name, |a, b| {
            from_bool(a > b || value::approx_eq(a, b))
        })?,
        Builtin::And => binary(stack, name, |a, b| from_bool(truthy(a) && truthy(b)))?,
        Builtin::Or => binary(stack, name, |a, b| from_bool(truthy(a) || truthy(b)))?,
        Builtin::Not => unary(stack, name, |a| from_bool(!truthy(a)))?,

        // Both branches were evaluated before the selector runs.
        Builtin::If => {
            let [c, t, f] = pop_numbers::<3>(stack, name)?;
            stack.push(Value::Number(if truthy(c) { t } else { f }));
        }
        Builtin::IfP => {
            let f = pop_color(stack, name)?;
            let t = pop_color(stack, name)?;
            let c = pop_number(stack, name)?;
            stack.push(Value::Color(if truthy(c) { t } else { f }));
        }

        Builtin::Rgb => {
            let [r, g, b] = pop_numbers::<3>(stack, name)?;
            stack.push(Value::Color(Color::rgb(r, g, b)));
        }
        Builtin::Rgba => {
            let [r, g, b, a] = pop_numbers::<4>(stack, name)?;
            stack.push(Value::Color(Color::new(r, g, b, a)));
        }
        Builtin::Hsv => {
            let [h, s, v] = pop_numbers::<3>(stack, name)?;
            stack.push(Value::Color(Color::from_hsva(h, s, v, value::CHANNEL_MAX)));
        }
        Builtin::Hsva => {
            let [h, s, v, a] = pop_numbers::<4>(stack, name)?;
            stack.push(Value::Color(Color::from_hsva(h, s, v, a)));
        }
        Builtin::Red
        | Builtin::Green
        | Builtin::Blue
        | Builtin::Alpha
        | Builtin::Hue
        | Builtin::Sat
        | Builtin::Value => {
            let c = pop_color(stack, name)?;
            let v = match b {
                Builtin::Red => c.red(),
                Builtin::Green => c.green(),
                Builtin::Blue => c.blue(),
                Builtin::Alpha => c.alpha(),
                Builtin::Hue => c.hue(),
                Builtin::Sat => c.sat(),
                _ => c.value(),
            };
            stack.push(Value::Number(v));
        }

        Builtin::Det => {
            let [a, b, c, d] = pop_numbers::<4>(stack, name)?;
            stack.push(Value::Number(saturate(a * d - b * c)));
        }
        Builtin::Distance => {
            let [x1, y1, x2, y2] = pop_numbers::<4>(stack, name)?;
            stack.push(Value::Number(saturate((x2 - x1).hypot(y2 - y1))));
        }
        Builtin::Sin => unary(stack, name, f64::sin)?,
        Builtin::Cos => unary(stack, name, f64::cos)?,
        Builtin::Tan => unary(stack, name, f64::tan)?,
        Builtin::Atan2 => binary(stack, name, f64::atan2)?,
        Builtin::Sqrt => unary(stack, name, |a| if a < 0.0 { 0.0 } else { a.sqrt() })?,
        Builtin::Abs => unary(stack, name, f64::abs)?,
        Builtin::Exp => unary(stack, name, f64::exp)?,
        Builtin::Log => unary(stack, name, |a| {
            if a < value::EPSILON { -HUGE } else { a.ln() }
        })?,
        Builtin::Int => unary(stack, name, f64::trunc)?,
        Builtin::Floor => unary(stack, name, f64::floor)?,
        Builtin::Ceil => unary(stack, name, f64::ceil)?,
        Builtin::Min => binary(stack, name, f64::min)?,
        Builtin::Max => binary(stack, name, f64::max)?,
        Builtin::Clamp => {
            let [v, lo, hi] = pop_numbers::<3>(stack, name)?;
            let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            stack.push(Value::Number(v.clamp(lo, hi)));
        }
        Builtin::Lerp => {
            let [a, b, t] = pop_numbers::<3>(stack, name)?;
            stack.push(Value::Number(saturate(a + (b - a) * t)));
        }
    }
    Ok(())
}
