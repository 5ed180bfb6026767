use crate::expression::value::ValueType;

const N: ValueType = ValueType::Number;
const C: ValueType = ValueType::Color;

/// Every operator and function the instruction set knows, other than sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// Unary minus.
    Neg,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// Logical and.
    And,
    /// Logical or.
    Or,
    /// Logical not.
    Not,
    /// Numeric selector.
    If,
    /// Color selector.
    IfP,
    /// Opaque color from r, g, b.
    Rgb,
    /// Color from r, g, b, a.
    Rgba,
    /// Opaque color from h, s, v.
    Hsv,
    /// Color from h, s, v, a.
    Hsva,
    /// Red channel.
    Red,
    /// Green channel.
    Green,
    /// Blue channel.
    Blue,
    /// Alpha channel.
    Alpha,
    /// HSV hue.
    Hue,
    /// HSV saturation.
    Sat,
    /// HSV value.
    Value,
    /// 2x2 determinant `a*d - b*c`.
    Det,
    /// Sine.
    Sin,
    /// Cosine.
    Cos,
    /// Tangent.
    Tan,
    /// Two-argument arctangent `atan2(y, x)`.
    Atan2,
    /// Square root.
    Sqrt,
    /// Absolute value.
    Abs,
    /// Natural exponential.
    Exp,
    /// Natural logarithm.
    Log,
    /// Truncate toward zero.
    Int,
    /// Floor.
    Floor,
    /// Ceiling.
    Ceil,
    /// Minimum of two numbers.
    Min,
    /// Maximum of two numbers.
    Max,
    /// `clamp(v, lo, hi)`.
    Clamp,
    /// `lerp(a, b, t)`.
    Lerp,
    /// `distance(x1, y1, x2, y2)`.
    Distance,
}

/// One accepted operand-type tuple and the type it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Signature {
    pub(crate) args: &'static [ValueType],
    pub(crate) ret: ValueType,
}

const fn sig(args: &'static [ValueType], ret: ValueType) -> Signature {
    Signature { args, ret }
}

const NUM1: &[Signature] = &[sig(&[N], N)];
const NUM2: &[Signature] = &[sig(&[N, N], N)];
const NUM3: &[Signature] = &[sig(&[N, N, N], N)];
const NUM4: &[Signature] = &[sig(&[N, N, N, N], N)];
const NUM_OR_COLOR2: &[Signature] = &[sig(&[N, N], N), sig(&[C, C], C)];
const COLOR3: &[Signature] = &[sig(&[N, N, N], C)];
const COLOR4: &[Signature] = &[sig(&[N, N, N, N], C)];
const CHANNEL: &[Signature] = &[sig(&[C], N)];
const IFP: &[Signature] = &[sig(&[N, C, C], C)];

/// Names accepted for each builtin. The first spelling of each builtin is canonical.
const NAMES: &[(&str, Builtin)] = &[
    ("add", Builtin::Add),
    ("+", Builtin::Add),
    ("subtract", Builtin::Sub),
    ("-", Builtin::Sub),
    ("mult", Builtin::Mul),
    ("*", Builtin::Mul),
    ("div", Builtin::Div),
    ("/", Builtin::Div),
    ("mod", Builtin::Mod),
    ("%", Builtin::Mod),
    ("pow", Builtin::Pow),
    ("**", Builtin::Pow),
    ("uminus", Builtin::Neg),
    ("neg", Builtin::Neg),
    ("eq", Builtin::Eq),
    ("==", Builtin::Eq),
    ("ne", Builtin::Ne),
    ("!=", Builtin::Ne),
    ("lt", Builtin::Lt),
    ("<", Builtin::Lt),
    ("le", Builtin::Le),
    ("<=", Builtin::Le),
    ("gt", Builtin::Gt),
    (">", Builtin::Gt),
    ("ge", Builtin::Ge),
    (">=", Builtin::Ge),
    ("and", Builtin::And),
    ("&&", Builtin::And),
    ("or", Builtin::Or),
    ("||", Builtin::Or),
    ("not", Builtin::Not),
    ("!", Builtin::Not),
    ("if", Builtin::If),
    ("ifp", Builtin::IfP),
    ("rgb", Builtin::Rgb),
    ("rgba", Builtin::Rgba),
    ("hsv", Builtin::Hsv),
    ("hsva", Builtin::Hsva),
    ("red", Builtin::Red),
    ("green", Builtin::Green),
    ("blue", Builtin::Blue),
    ("alpha", Builtin::Alpha),
    ("hue", Builtin::Hue),
    ("sat", Builtin::Sat),
    ("value", Builtin::Value),
    ("det", Builtin::Det),
    ("sin", Builtin::Sin),
    ("cos", Builtin::Cos),
    ("tan", Builtin::Tan),
    ("atan2", Builtin::Atan2),
    ("sqrt", Builtin::Sqrt),
    ("abs", Builtin::Abs),
    ("exp", Builtin::Exp),
    ("log", Builtin::Log),
    ("int", Builtin::Int),
    ("floor", Builtin::Floor),
    ("ceil", Builtin::Ceil),
    ("min", Builtin::Min),
    ("max", Builtin::Max),
    ("clamp", Builtin::Clamp),
    ("lerp", Builtin::Lerp),
    ("distance", Builtin::Distance),
];

impl Builtin {
    /// Look up a builtin by canonical name or alias.
    pub fn lookup(word: &str) -> Option<Self> {
        NAMES.iter().find(|(n, _)| *n == word).map(|&(_, b)| b)
    }

    /// `true` when `word` names a builtin or a sampling function.
    pub(crate) fn is_reserved_word(word: &str) -> bool {
        Self::lookup(word).is_some() || sample_index(word).is_some()
    }

    /// Canonical spelling.
    pub fn name(self) -> &'static str {
        NAMES
            .iter()
            .find(|(_, b)| *b == self)
            .map(|&(n, _)| n)
            .unwrap_or("?")
    }

    pub(crate) fn signatures(self) -> &'static [Signature] {
        match self {
            Self::Add | Self::Sub | Self::Mul => NUM_OR_COLOR2,
            Self::Div | Self::Mod | Self::Pow => NUM2,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => NUM2,
            Self::And | Self::Or => NUM2,
            Self::Neg | Self::Not => NUM1,
            Self::If => NUM3,
            Self::IfP => IFP,
            Self::Rgb | Self::Hsv => COLOR3,
            Self::Rgba | Self::Hsva => COLOR4,
            Self::Red
            | Self::Green
            | Self::Blue
            | Self::Alpha
            | Self::Hue
            | Self::Sat
            | Self::Value => CHANNEL,
            Self::Det | Self::Distance => NUM4,
            Self::Sin
            | Self::Cos
            | Self::Tan
            | Self::Sqrt
            | Self::Abs
            | Self::Exp
            | Self::Log
            | Self::Int
            | Self::Floor
            | Self::Ceil => NUM1,
            Self::Atan2 | Self::Min | Self::Max => NUM2,
            Self::Clamp | Self::Lerp => NUM3,
        }
    }

    /// Number of operands consumed.
    pub fn arity(self) -> usize {
        self.signatures()[0].args.len()
    }

    /// Result type for the given operand types, or `None` if no signature matches.
    pub(crate) fn resolve(self, args: &[ValueType]) -> Option<ValueType> {
        self.signatures()
            .iter()
            .find(|s| s.args == args)
            .map(|s| s.ret)
    }
}

/// `getp1` -> `Some(0)`, `getp2` -> `Some(1)`, `getp3` -> `Some(2)`.
pub(crate) fn sample_index(word: &str) -> Option<u8> {
    match word {
        "getp1" => Some(0),
        "getp2" => Some(1),
        "getp3" => Some(2),
        _ => None,
    }
}
