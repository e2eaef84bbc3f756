//! Numeric values and signatures crossing the host/guest boundary.

use std::fmt;

/// An integer type allowed in a boundary signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumType {
    I32,
    I64,
}

impl fmt::Display for NumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32 => write!(f, "i32"),
            Self::I64 => write!(f, "i64"),
        }
    }
}

/// A numeric value passed to or returned from a boundary function.
///
/// Values are unsigned; signed host integers are reinterpreted bit for bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    I32(u32),
    I64(u64),
}

impl Value {
    /// The type of this value.
    pub fn ty(&self) -> NumType {
        match self {
            Self::I32(_) => NumType::I32,
            Self::I64(_) => NumType::I64,
        }
    }

    /// The value zero-extended to 64 bits.
    pub fn bits(&self) -> u64 {
        match *self {
            Self::I32(v) => v as u64,
            Self::I64(v) => v,
        }
    }

    /// Whether this value can be passed as `ty` without losing bits:
    /// the same type, or an `I32` widening into an `I64` parameter.
    pub fn fits(&self, ty: NumType) -> bool {
        matches!(
            (self.ty(), ty),
            (NumType::I32, _) | (NumType::I64, NumType::I64)
        )
    }

    /// Coerce to `ty`, truncating to the low 32 bits for `I32`.
    pub fn coerce(&self, ty: NumType) -> Self {
        match ty {
            NumType::I32 => Self::I32(self.bits() as u32),
            NumType::I64 => Self::I64(self.bits()),
        }
    }

    /// The low 32 bits.
    pub fn as_u32(&self) -> u32 {
        self.bits() as u32
    }

    pub fn as_u64(&self) -> u64 {
        self.bits()
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::I32(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v as u32)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::I64(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::I64(v as u64)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "{}:i32", v),
            Self::I64(v) => write!(f, "{}:i64", v),
        }
    }
}

/// Ordered parameter and result types of a boundary function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    pub params: Vec<NumType>,
    pub results: Vec<NumType>,
}

impl Signature {
    pub fn new(
        params: impl IntoIterator<Item = NumType>,
        results: impl IntoIterator<Item = NumType>,
    ) -> Self {
        Self {
            params: params.into_iter().collect(),
            results: results.into_iter().collect(),
        }
    }

    /// A signature with `params` i32 parameters and `results` i32 results.
    pub fn i32s(params: usize, results: usize) -> Self {
        Self::new(
            std::iter::repeat(NumType::I32).take(params),
            std::iter::repeat(NumType::I32).take(results),
        )
    }

    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Check that `values` has exactly the result types of this signature.
    pub fn accepts_results(&self, values: &[Value]) -> bool {
        values.len() == self.results.len()
            && values.iter().zip(&self.results).all(|(v, t)| v.ty() == *t)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |types: &[NumType]| {
            types
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(f, "({}) -> ({})", join(&self.params), join(&self.results))
    }
}
