//! Element types.
//!
//! Buffers are stored as `f64`; the [`DType`] tag governs how values are
//! coerced when a tensor is constructed and which element type a binary
//! result reports. Integer dtypes truncate toward zero, `Float32` rounds
//! through `f32` precision.

use ndarray::ArrayD;
use std::fmt;

/// Element type of a tensor.
///
/// Variant order defines promotion precedence: the result of a binary
/// operation takes the larger of the two operand dtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl DType {
    /// Whether this is a floating-point dtype.
    pub fn is_float(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    /// Result dtype of a binary operation between `self` and `other`.
    pub fn promote(self, other: DType) -> DType {
        self.max(other)
    }

    /// Coerce a single value to this dtype's precision.
    pub fn coerce(self, value: f64) -> f64 {
        match self {
            DType::Int8 => value as i8 as f64,
            DType::Int16 => value as i16 as f64,
            DType::Int32 => value as i32 as f64,
            DType::Int64 => value as i64 as f64,
            DType::Float32 => value as f32 as f64,
            DType::Float64 => value,
        }
    }

    /// Coerce every element of an array to this dtype's precision.
    pub(crate) fn coerce_array(self, data: ArrayD<f64>) -> ArrayD<f64> {
        if self == DType::Float64 {
            data
        } else {
            data.mapv(|v| self.coerce(v))
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        };
        write!(f, "{name}")
    }
}
