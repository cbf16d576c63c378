//! Tensor: a labeled, possibly-differentiable dense array value.

use crate::config;
use crate::dtype::DType;
use crate::error::GradError;
use crate::op::validate_name;
use ndarray::{arr0, ArrayD, IxDyn};
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TENSOR_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique tensor identity.
///
/// Gradient accumulation is keyed by this id rather than by address, so a
/// tensor keeps its identity across clones and in-place data updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorId(u64);

impl TensorId {
    fn fresh() -> Self {
        Self(NEXT_TENSOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The underlying integer index.
    pub fn index(self) -> u64 {
        self.0
    }
}

/// A dense array value with an element type, an optional name, and a
/// gradient slot populated by [`Graph::gradient`](crate::Graph::gradient).
///
/// A tensor built with one of the `variable` constructors is a
/// differentiation leaf; results derived from at least one variable are
/// *tracked* and participate in gradient accumulation.
///
/// # Example
///
/// ```
/// use ndgrad::Tensor;
///
/// let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
/// assert_eq!(a.shape(), &[2, 2]);
/// assert!(!a.is_variable());
/// assert!(a.grad().is_none());
/// ```
#[derive(Clone)]
pub struct Tensor {
    id: TensorId,
    data: ArrayD<f64>,
    dtype: DType,
    is_variable: bool,
    tracked: bool,
    grad: RefCell<Option<ArrayD<f64>>>,
    name: Option<String>,
}

impl Tensor {
    fn construct(data: ArrayD<f64>, dtype: DType, is_variable: bool) -> Self {
        Self {
            id: TensorId::fresh(),
            data: dtype.coerce_array(data),
            dtype,
            is_variable,
            tracked: is_variable,
            grad: RefCell::new(None),
            name: None,
        }
    }

    /// Create a constant tensor with the default dtype.
    pub fn new(data: ArrayD<f64>) -> Self {
        Self::construct(data, config::default_dtype(), false)
    }

    /// Create a differentiation leaf with the default dtype.
    pub fn variable(data: ArrayD<f64>) -> Self {
        Self::construct(data, config::default_dtype(), true)
    }

    /// Create a 0-dimensional constant tensor.
    pub fn scalar(value: f64) -> Self {
        Self::new(arr0(value).into_dyn())
    }

    /// Create a 0-dimensional differentiation leaf.
    pub fn scalar_variable(value: f64) -> Self {
        Self::variable(arr0(value).into_dyn())
    }

    /// Create a constant tensor from a flat buffer and a shape.
    ///
    /// Fails with [`GradError::ShapeMismatch`] if the buffer length does not
    /// match the shape.
    pub fn from_vec(data: Vec<f64>, shape: &[usize]) -> Result<Self, GradError> {
        let actual = data.len();
        let array = ArrayD::from_shape_vec(IxDyn(shape), data).map_err(|_| {
            GradError::ShapeMismatch {
                expected: shape.iter().product(),
                actual,
            }
        })?;
        Ok(Self::new(array))
    }

    /// Mark this tensor as a differentiation leaf.
    pub fn into_variable(mut self) -> Self {
        self.is_variable = true;
        self.tracked = true;
        self
    }

    /// Re-coerce the data to `dtype` and tag the tensor with it.
    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.data = dtype.coerce_array(self.data);
        self.dtype = dtype;
        self
    }

    /// Attach a human-readable name.
    ///
    /// The name must be a single identifier (letters, digits, underscores,
    /// not starting with a digit, no dots); anything else fails with
    /// [`GradError::InvalidName`].
    pub fn with_name(mut self, name: &str) -> Result<Self, GradError> {
        validate_name(name)?;
        self.name = Some(name.to_string());
        Ok(self)
    }

    /// Construct an operator result (already coerced, possibly tracked).
    pub(crate) fn from_op(data: ArrayD<f64>, dtype: DType, tracked: bool, name: String) -> Self {
        Self {
            id: TensorId::fresh(),
            data: dtype.coerce_array(data),
            dtype,
            is_variable: false,
            tracked,
            grad: RefCell::new(None),
            name: Some(name),
        }
    }

    /// Tensor identity.
    pub fn id(&self) -> TensorId {
        self.id
    }

    /// The underlying array buffer.
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Mutable access to the underlying buffer.
    ///
    /// Used by optimizers to update parameters in place; the tensor keeps
    /// its identity.
    pub fn data_mut(&mut self) -> &mut ArrayD<f64> {
        &mut self.data
    }

    /// Element type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Shape of the data.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor has no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether this tensor is a differentiation leaf.
    pub fn is_variable(&self) -> bool {
        self.is_variable
    }

    /// Whether this tensor is a variable or derived from one.
    pub fn is_tracked(&self) -> bool {
        self.tracked
    }

    /// Optional name (operator results are named `<op>.out`).
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Display name for error messages.
    pub(crate) fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("tensor#{}", self.id.0),
        }
    }

    /// The gradient computed by the most recent gradient query, if any.
    ///
    /// `None` means no backward pass has populated the slot yet.
    pub fn grad(&self) -> Option<ArrayD<f64>> {
        self.grad.borrow().clone()
    }

    /// Clear the gradient slot (typically between training iterations).
    pub fn clear_grad(&self) {
        *self.grad.borrow_mut() = None;
    }

    /// Write the gradient slot; coerced to the tensor's dtype so the slot
    /// always matches `data` in shape and element type.
    pub(crate) fn set_grad(&self, grad: ArrayD<f64>) {
        debug_assert_eq!(grad.shape(), self.data.shape());
        *self.grad.borrow_mut() = Some(self.dtype.coerce_array(grad));
    }

    // Convenience methods delegating to the free-function primitives.

    /// Elementwise sum reduction; see [`crate::op::sum`].
    pub fn sum(&self, axis: Option<isize>, keepdims: bool) -> Result<Tensor, GradError> {
        crate::op::sum(self, axis, keepdims, None)
    }

    /// Mean reduction; see [`crate::op::mean`].
    pub fn mean(&self, axis: Option<isize>, keepdims: bool) -> Result<Tensor, GradError> {
        crate::op::mean(self, axis, keepdims, None)
    }

    /// Reshape; see [`crate::op::reshape`].
    pub fn reshape(&self, newshape: &[isize]) -> Result<Tensor, GradError> {
        crate::op::reshape(self, newshape, None)
    }

    /// Transpose with full axis reversal; see [`crate::op::transpose`].
    pub fn t(&self) -> Result<Tensor, GradError> {
        crate::op::transpose(self, None, None)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("id", &self.id)
            .field("shape", &self.data.shape())
            .field("dtype", &self.dtype)
            .field("is_variable", &self.is_variable)
            .field("tracked", &self.tracked)
            .field("has_grad", &self.grad.borrow().is_some())
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_ids_are_unique() {
        let a = Tensor::scalar(1.0);
        let b = Tensor::scalar(1.0);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_clone_preserves_identity() {
        let a = Tensor::scalar_variable(2.0);
        let b = a.clone();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_from_vec_shape_mismatch() {
        let err = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[2, 2]).unwrap_err();
        assert!(matches!(
            err,
            GradError::ShapeMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_variable_is_tracked() {
        let a = Tensor::scalar_variable(1.0);
        assert!(a.is_variable());
        assert!(a.is_tracked());

        let b = Tensor::scalar(1.0);
        assert!(!b.is_variable());
        assert!(!b.is_tracked());
    }

    #[test]
    fn test_with_dtype_coerces() {
        let a = Tensor::from_vec(vec![1.7, -2.9], &[2])
            .unwrap()
            .with_dtype(DType::Int32);
        assert_eq!(a.data().as_slice().unwrap(), &[1.0, -2.0]);
        assert_eq!(a.dtype(), DType::Int32);
    }

    #[test]
    fn test_with_name_rejects_dotted() {
        let err = Tensor::scalar(0.0).with_name("a.b").unwrap_err();
        assert!(matches!(err, GradError::InvalidName { .. }));
    }

    #[test]
    fn test_grad_slot_starts_empty() {
        let a = Tensor::scalar_variable(1.0);
        assert!(a.grad().is_none());
        a.set_grad(arr0(3.0).into_dyn());
        assert_eq!(a.grad().unwrap().sum(), 3.0);
        a.clear_grad();
        assert!(a.grad().is_none());
    }
}
