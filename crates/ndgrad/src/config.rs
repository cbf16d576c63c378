//! Process configuration.
//!
//! Holds the default element type used when a tensor is constructed without
//! an explicit dtype. The setting is thread-local, matching the engine's
//! single-threaded recording discipline.

use crate::dtype::DType;
use crate::error::GradError;
use std::cell::Cell;

thread_local! {
    static DEFAULT_DTYPE: Cell<DType> = const { Cell::new(DType::Float64) };
}

/// Default dtype used for new tensors.
pub fn default_dtype() -> DType {
    DEFAULT_DTYPE.with(|d| d.get())
}

/// Set the default dtype for new tensors.
///
/// Only `Float32` and `Float64` are accepted; anything else fails with
/// [`GradError::InvalidDType`] naming the offending dtype.
pub fn set_default_dtype(dtype: DType) -> Result<(), GradError> {
    if !dtype.is_float() {
        return Err(GradError::InvalidDType { dtype });
    }
    DEFAULT_DTYPE.with(|d| d.set(dtype));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_float64() {
        assert_eq!(default_dtype(), DType::Float64);
    }

    #[test]
    fn test_set_float_dtype() {
        set_default_dtype(DType::Float32).unwrap();
        assert_eq!(default_dtype(), DType::Float32);
        set_default_dtype(DType::Float64).unwrap();
    }

    #[test]
    fn test_reject_integer_dtype() {
        let err = set_default_dtype(DType::Int32).unwrap_err();
        assert!(matches!(err, GradError::InvalidDType { dtype: DType::Int32 }));
        assert_eq!(default_dtype(), DType::Float64);
    }
}
