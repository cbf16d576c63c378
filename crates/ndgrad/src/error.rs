//! Error types for ndgrad.

use crate::dtype::DType;
use thiserror::Error;

/// Errors that can occur while building tensors, recording a graph, or
/// running a gradient query.
#[derive(Debug, Error)]
pub enum GradError {
    /// Data length does not match the requested shape.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Shapes cannot be broadcast together.
    #[error("operands could not be broadcast together: {lhs:?} vs {rhs:?}")]
    Broadcast { lhs: Vec<usize>, rhs: Vec<usize> },

    /// Matrix shapes are not compatible for matrix multiplication.
    #[error("shapes {lhs:?} and {rhs:?} are not aligned for matmul")]
    IncompatibleMatmul { lhs: Vec<usize>, rhs: Vec<usize> },

    /// Operation requires a specific tensor rank.
    #[error("expected tensor of rank {expected}, got rank {actual}")]
    RankMismatch { expected: usize, actual: usize },

    /// Reduction axis out of range.
    #[error("axis {axis} is out of range for tensor with {ndim} dimensions")]
    InvalidAxis { axis: isize, ndim: usize },

    /// Invalid axis permutation.
    #[error("invalid permutation {perm:?} for tensor with {ndim} dimensions")]
    InvalidPermutation { perm: Vec<usize>, ndim: usize },

    /// Invalid target shape for reshape.
    #[error("invalid shape {shape:?}: {reason}")]
    InvalidShape { shape: Vec<isize>, reason: &'static str },

    /// Malformed operation or tensor name.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// Dtype not allowed as the process default.
    #[error("default dtype must be float32 or float64, not {dtype}")]
    InvalidDType { dtype: DType },

    /// Operator invoked with the wrong number of inputs.
    #[error("operator '{primitive}' expects {expected} inputs, got {actual}")]
    Arity {
        primitive: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Operator invoked with no inputs at all.
    #[error("operator '{primitive}' requires at least one input")]
    MissingInputs { primitive: &'static str },

    /// A recording scope is already active on this thread.
    #[error("a graph is already being recorded on this thread")]
    ScopeActive,

    /// The same result tensor was recorded twice in one graph.
    #[error("result tensor #{id} is already recorded in the active graph")]
    DuplicateNode { id: u64 },

    /// Gradient requested through a value with no variable in its lineage.
    #[error("differentiation is not possible: {reason}")]
    Differentiation { reason: &'static str },

    /// A recorded primitive has no backward function in the registry.
    #[error("gradient of '{primitive}' is not registered")]
    UnregisteredDerivative { primitive: &'static str },

    /// A recorded node carries auxiliary parameters of the wrong kind.
    #[error("recorded node for '{primitive}' carries malformed auxiliary parameters")]
    MalformedNode { primitive: &'static str },

    /// Optimizer hyperparameter outside its valid range.
    #[error("hyperparameter '{name}' must be in ({low}, {high}), got {value}")]
    InvalidHyperparameter {
        name: &'static str,
        low: f64,
        high: f64,
        value: f64,
    },

    /// Optimizer parameter has no gradient to consume.
    #[error("no gradient available for parameter '{name}'")]
    MissingGradient { name: String },
}
