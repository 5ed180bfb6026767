use crate::expression::builtins::Builtin;
use crate::expression::bytecode::ConstIdx;
use crate::expression::lexer::is_identifier;
use crate::foundation::error::{PixformError, PixformResult};
use std::collections::{BTreeMap, HashMap};

/// Read-only table of named numeric constants visible to every pixel evaluation.
///
/// Built once per invocation: `pi`, the output geometry `w h cx cy`, the geometry of each input
/// image `wN hN cxN cyN` (1-based), then the caller's constants in name order.
#[derive(Debug, Clone)]
pub struct Context {
    names: Vec<String>,
    values: Vec<f64>,
    index: HashMap<String, ConstIdx>,
    image_count: usize,
}

impl Context {
    /// Build the context for an output of `width x height` and inputs of the given `(w, h)`.
    ///
    /// Fails with a usage error when a caller constant is not an identifier or would shadow an
    /// ambient coordinate, a built-in constant or a function name.
    pub fn build(
        width: u32,
        height: u32,
        image_dims: &[(u32, u32)],
        constants: &BTreeMap<String, f64>,
    ) -> PixformResult<Self> {
        let mut ctx = Self {
            names: Vec::new(),
            values: Vec::new(),
            index: HashMap::new(),
            image_count: image_dims.len(),
        };

        ctx.insert("pi", std::f64::consts::PI);
        ctx.insert_geometry("", width, height);
        for (i, &(w, h)) in image_dims.iter().enumerate() {
            ctx.insert_geometry(&(i + 1).to_string(), w, h);
        }

        for (name, &value) in constants {
            if !is_identifier(name) {
                return Err(PixformError::usage(format!(
                    "constant name '{name}' is not an identifier"
                )));
            }
            if matches!(name.as_str(), "x" | "y") || Builtin::is_reserved_word(name) {
                return Err(PixformError::usage(format!(
                    "constant name '{name}' is reserved"
                )));
            }
            if ctx.index.contains_key(name) {
                return Err(PixformError::usage(format!(
                    "constant '{name}' collides with a built-in constant"
                )));
            }
            if !value.is_finite() {
                return Err(PixformError::usage(format!(
                    "constant '{name}' must be finite"
                )));
            }
            ctx.insert(name, value);
        }

        Ok(ctx)
    }

    fn insert(&mut self, name: &str, value: f64) {
        let idx = ConstIdx(self.values.len() as u32);
        self.names.push(name.to_owned());
        self.values.push(value);
        self.index.insert(name.to_owned(), idx);
    }

    fn insert_geometry(&mut self, suffix: &str, w: u32, h: u32) {
        let (w, h) = (f64::from(w), f64::from(h));
        self.insert(&format!("w{suffix}"), w);
        self.insert(&format!("h{suffix}"), h);
        self.insert(&format!("cx{suffix}"), w / 2.0);
        self.insert(&format!("cy{suffix}"), h / 2.0);
    }

    /// Resolve a constant name.
    pub fn lookup(&self, name: &str) -> Option<ConstIdx> {
        self.index.get(name).copied()
    }

    /// Value of a resolved constant.
    pub fn value(&self, idx: ConstIdx) -> Option<f64> {
        self.values.get(idx.0 as usize).copied()
    }

    /// Value of a constant by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.lookup(name).and_then(|i| self.value(i))
    }

    /// Number of input images the context describes.
    pub fn image_count(&self) -> usize {
        self.image_count
    }

    /// `(name, value)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}
