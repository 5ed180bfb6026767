//! Scalar/color value model shared by the compiler's type checker and the VM.
//!
//! Colors carry four `f64` channels in `[0, 255]` (alpha included). Numbers are plain `f64`
//! with a few guarded operations so that no evaluation ever yields an infinity or a NaN.

/// Tolerance used by equality, truthiness and the near-zero guards of `/ % **`.
pub const EPSILON: f64 = 1e-6;

/// Finite stand-in for infinities produced by division or exponentiation.
pub const HUGE: f64 = 1e10;

/// Upper bound of the channel domain.
pub const CHANNEL_MAX: f64 = 255.0;

/// Static type of a value, tracked by the compiler's simulated stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// A scalar `f64`; booleans are numbers `1.0` / `0.0`.
    Number,
    /// An RGBA color.
    Color,
}

impl ValueType {
    /// Short lowercase name used in diagnostics and disassembly.
    pub fn name(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Color => "color",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Straight-alpha RGBA color with channels clamped into `[0, 255]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    r: f64,
    g: f64,
    b: f64,
    a: f64,
}

fn clamp_channel(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, CHANNEL_MAX)
    }
}

fn channel_to_u8(v: f64) -> u8 {
    clamp_channel(v).round() as u8
}

impl Color {
    /// Build a color, clamping every channel into the channel domain.
    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self {
            r: clamp_channel(r),
            g: clamp_channel(g),
            b: clamp_channel(b),
            a: clamp_channel(a),
        }
    }

    /// Opaque color from three channels.
    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self::new(r, g, b, CHANNEL_MAX)
    }

    /// Opaque grey `(v, v, v, 255)`; used to widen a numeric result to a color.
    pub fn grey(v: f64) -> Self {
        Self::rgb(v, v, v)
    }

    /// Straight RGBA8 into a color.
    pub fn from_rgba8(px: [u8; 4]) -> Self {
        Self::new(
            f64::from(px[0]),
            f64::from(px[1]),
            f64::from(px[2]),
            f64::from(px[3]),
        )
    }

    /// Round each channel to the nearest integer.
    pub fn to_rgba8(self) -> [u8; 4] {
        [
            channel_to_u8(self.r),
            channel_to_u8(self.g),
            channel_to_u8(self.b),
            channel_to_u8(self.a),
        ]
    }

    /// Red channel.
    pub fn red(self) -> f64 {
        self.r
    }

    /// Green channel.
    pub fn green(self) -> f64 {
        self.g
    }

    /// Blue channel.
    pub fn blue(self) -> f64 {
        self.b
    }

    /// Alpha channel.
    pub fn alpha(self) -> f64 {
        self.a
    }

    /// Rec.601 luma of the color channels.
    pub fn luma(self) -> f64 {
        0.299 * self.r + 0.587 * self.g + 0.114 * self.b
    }

    /// Apply `f` channel-wise to `self` and `other`, alpha included.
    pub fn zip_with(self, other: Self, f: impl Fn(f64, f64) -> f64) -> Self {
        Self::new(
            f(self.r, other.r),
            f(self.g, other.g),
            f(self.b, other.b),
            f(self.a, other.a),
        )
    }

    /// HSV to RGB. Hue is in degrees (wrapped into `[0, 360)`), saturation and value in `[0, 1]`.
    pub fn from_hsva(h: f64, s: f64, v: f64, a: f64) -> Self {
        let h = if h.is_finite() { h.rem_euclid(360.0) } else { 0.0 };
        let s = clamp_unit(s);
        let v = clamp_unit(v);

        let c = v * s;
        let hp = h / 60.0;
        let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
        let (r1, g1, b1) = match hp as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = v - c;
        Self::new(
            (r1 + m) * CHANNEL_MAX,
            (g1 + m) * CHANNEL_MAX,
            (b1 + m) * CHANNEL_MAX,
            a,
        )
    }

    fn max_min(self) -> (f64, f64) {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        (max, min)
    }

    /// Hue in degrees `[0, 360)`; 0 for achromatic colors.
    pub fn hue(self) -> f64 {
        let (max, min) = self.max_min();
        let delta = max - min;
        if delta <= 0.0 {
            return 0.0;
        }
        let h = if max == self.r {
            ((self.g - self.b) / delta).rem_euclid(6.0)
        } else if max == self.g {
            (self.b - self.r) / delta + 2.0
        } else {
            (self.r - self.g) / delta + 4.0
        };
        (h * 60.0).rem_euclid(360.0)
    }

    /// HSV saturation in `[0, 1]`.
    pub fn sat(self) -> f64 {
        let (max, min) = self.max_min();
        if max <= 0.0 { 0.0 } else { (max - min) / max }
    }

    /// HSV value in `[0, 1]`.
    pub fn value(self) -> f64 {
        self.max_min().0 / CHANNEL_MAX
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// A runtime value on the VM stack.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    /// Scalar.
    Number(f64),
    /// Color.
    Color(Color),
}

impl Value {
    /// Static type of this value.
    pub fn ty(self) -> ValueType {
        match self {
            Self::Number(_) => ValueType::Number,
            Self::Color(_) => ValueType::Color,
        }
    }

    /// The scalar, if this is a number.
    pub fn as_number(self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(v),
            Self::Color(_) => None,
        }
    }

    /// The color, if this is a color.
    pub fn as_color(self) -> Option<Color> {
        match self {
            Self::Color(c) => Some(c),
            Self::Number(_) => None,
        }
    }
}

/// Map infinities to `±HUGE` and NaN to 0.
pub fn saturate(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else if v.is_infinite() {
        HUGE.copysign(v)
    } else {
        v
    }
}

/// `true` when `|a - b| < EPSILON`.
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// Condition truthiness: distinctly nonzero.
pub fn truthy(c: f64) -> bool {
    c.abs() >= EPSILON
}

/// Boolean as number.
pub fn from_bool(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// Division with the near-zero divisor guard.
pub fn div(a: f64, b: f64) -> f64 {
    if b.abs() < EPSILON {
        if a < 0.0 { -HUGE } else { HUGE }
    } else {
        saturate(a / b)
    }
}

/// Floating remainder (`fmod`); 0 for a near-zero divisor.
pub fn fmod(a: f64, b: f64) -> f64 {
    if b.abs() < EPSILON {
        0.0
    } else {
        saturate(a % b)
    }
}

/// Exponentiation with the near-zero base guard.
pub fn pow(a: f64, b: f64) -> f64 {
    if a.abs() < EPSILON && b < 0.0 {
        return HUGE;
    }
    saturate(a.powf(b))
}
