//! Differentiable primitives.
//!
//! Every primitive is a type implementing [`Operator`]: a pure `forward`
//! over raw `ndarray` buffers paired with a `backward` mapping an output
//! gradient to one gradient per input. The provided [`Operator::apply`]
//! entry point validates arguments, runs the forward step, records a node
//! when a recording scope is active and any input is tracked, and names the
//! result `<name>.out`.
//!
//! Each primitive is also exposed as a free function taking tensors, and
//! the elementwise ones as operator overloads on [`Tensor`].

mod arithmetic;
mod hyperbolic;
mod matmul;
mod reduce;
mod shape;
mod unary;

pub use arithmetic::{add, divide, multiply, negate, subtract};
pub use hyperbolic::{cosh, sinh, tanh};
pub use matmul::matmul;
pub use reduce::{mean, sum};
pub use shape::{reshape, transpose};
pub use unary::{exp, log, sqrt, square};

pub(crate) use arithmetic::{add_vjp, divide_vjp, multiply_vjp, negate_vjp, subtract_vjp};
pub(crate) use hyperbolic::{cosh_vjp, sinh_vjp, tanh_vjp};
pub(crate) use matmul::matmul_vjp;
pub(crate) use reduce::{mean_vjp, sum_vjp};
pub(crate) use shape::{reshape_vjp, transpose_vjp};
pub(crate) use unary::{exp_vjp, log_vjp, sqrt_vjp, square_vjp};

use crate::error::GradError;
use crate::graph::{self, Node, NodeInput};
use crate::tensor::Tensor;
use ndarray::ArrayD;
use std::fmt;
use std::ops;

/// Identity of a differentiable primitive.
///
/// This is the key the gradient registry is indexed by; [`Primitive::Custom`]
/// lets downstream code register additional primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Add,
    Subtract,
    Multiply,
    Divide,
    Matmul,
    Negate,
    Exp,
    Log,
    Sqrt,
    Square,
    Sum,
    Mean,
    Reshape,
    Transpose,
    Sinh,
    Cosh,
    Tanh,
    /// An extension primitive registered by downstream code.
    Custom(&'static str),
}

impl Primitive {
    /// Lowercase name, used as the default operation name.
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Add => "add",
            Primitive::Subtract => "subtract",
            Primitive::Multiply => "multiply",
            Primitive::Divide => "divide",
            Primitive::Matmul => "matmul",
            Primitive::Negate => "negate",
            Primitive::Exp => "exp",
            Primitive::Log => "log",
            Primitive::Sqrt => "sqrt",
            Primitive::Square => "square",
            Primitive::Sum => "sum",
            Primitive::Mean => "mean",
            Primitive::Reshape => "reshape",
            Primitive::Transpose => "transpose",
            Primitive::Sinh => "sinh",
            Primitive::Cosh => "cosh",
            Primitive::Tanh => "tanh",
            Primitive::Custom(name) => name,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Auxiliary parameters a backward step needs beyond the raw inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpArgs {
    /// No auxiliary parameters.
    None,
    /// Reduction parameters (`sum`, `mean`).
    Reduce {
        axis: Option<usize>,
        keepdims: bool,
    },
    /// Axis permutation (`transpose`); `None` means full reversal.
    Permute { axes: Option<Vec<usize>> },
}

/// Validate an operation or tensor name.
///
/// A name must be a single identifier: letters, digits, and underscores,
/// not starting with a digit. Dots are rejected because `.out` is the
/// reserved suffix for operator results.
pub fn validate_name(name: &str) -> Result<(), GradError> {
    let invalid = |reason| GradError::InvalidName {
        name: name.to_string(),
        reason,
    };
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(invalid("name must not be empty")),
        Some(c) if c.is_ascii_digit() => {
            return Err(invalid("name must not start with a digit"))
        }
        Some(c) if !(c.is_ascii_alphanumeric() || c == '_') => {
            return Err(invalid("name must be a single identifier"))
        }
        Some(_) => {}
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("name must be a single identifier"));
    }
    Ok(())
}

/// The forward/backward contract every differentiable primitive implements.
pub trait Operator {
    /// Identity of this primitive.
    fn primitive(&self) -> Primitive;

    /// Pure forward computation over raw buffers.
    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError>;

    /// Map the output gradient to one gradient per input (`None` for inputs
    /// that do not propagate a gradient).
    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError>;

    /// Auxiliary parameters to record alongside a node.
    fn args(&self) -> OpArgs {
        OpArgs::None
    }

    /// Public entry point: validate, run forward, record, and wrap.
    ///
    /// The result tensor is named `<name>.out`, defaulting to the primitive
    /// name. A node is recorded only when a recording scope is active and
    /// at least one input is a variable or derived from one.
    fn apply(&self, inputs: &[&Tensor], name: Option<&str>) -> Result<Tensor, GradError> {
        let primitive = self.primitive();
        if inputs.is_empty() {
            return Err(GradError::MissingInputs {
                primitive: primitive.name(),
            });
        }
        if let Some(name) = name {
            validate_name(name)?;
        }

        let buffers: Vec<&ArrayD<f64>> = inputs.iter().map(|t| t.data()).collect();
        let output = self.forward(&buffers)?;

        let dtype = inputs
            .iter()
            .map(|t| t.dtype())
            .reduce(|a, b| a.promote(b))
            .unwrap_or_else(crate::config::default_dtype);
        let tracked = inputs.iter().any(|t| t.is_tracked());
        let out_name = format!("{}.out", name.unwrap_or(primitive.name()));
        let result = Tensor::from_op(output, dtype, tracked, out_name);

        if tracked {
            graph::with_active_store(|store| {
                store.record(Node {
                    result_id: result.id(),
                    result: result.data().clone(),
                    primitive,
                    inputs: inputs
                        .iter()
                        .map(|t| NodeInput {
                            id: t.id(),
                            value: t.data().clone(),
                            tracked: t.is_tracked(),
                        })
                        .collect(),
                    args: self.args(),
                })
            })
            .transpose()?;
        }
        Ok(result)
    }
}

/// Extract exactly one input buffer.
pub(crate) fn unary_input<'a>(
    inputs: &[&'a ArrayD<f64>],
    primitive: Primitive,
) -> Result<&'a ArrayD<f64>, GradError> {
    match inputs {
        [x] => Ok(x),
        _ => Err(GradError::Arity {
            primitive: primitive.name(),
            expected: 1,
            actual: inputs.len(),
        }),
    }
}

/// Extract exactly two input buffers.
pub(crate) fn binary_inputs<'a>(
    inputs: &[&'a ArrayD<f64>],
    primitive: Primitive,
) -> Result<(&'a ArrayD<f64>, &'a ArrayD<f64>), GradError> {
    match inputs {
        [x, y] => Ok((x, y)),
        _ => Err(GradError::Arity {
            primitive: primitive.name(),
            expected: 2,
            actual: inputs.len(),
        }),
    }
}

fn infallible(result: Result<Tensor, GradError>) -> Tensor {
    match result {
        Ok(tensor) => tensor,
        Err(err) => panic!("tensor operator failed: {err}"),
    }
}

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $func:path) => {
        impl ops::$trait<&Tensor> for &Tensor {
            type Output = Tensor;
            fn $method(self, rhs: &Tensor) -> Tensor {
                infallible($func(self, rhs, None))
            }
        }

        impl ops::$trait<Tensor> for Tensor {
            type Output = Tensor;
            fn $method(self, rhs: Tensor) -> Tensor {
                infallible($func(&self, &rhs, None))
            }
        }

        impl ops::$trait<f64> for &Tensor {
            type Output = Tensor;
            fn $method(self, rhs: f64) -> Tensor {
                infallible($func(self, &Tensor::scalar(rhs), None))
            }
        }
    };
}

binary_operator!(Add, add, arithmetic::add);
binary_operator!(Sub, sub, arithmetic::subtract);
binary_operator!(Mul, mul, arithmetic::multiply);
binary_operator!(Div, div, arithmetic::divide);

impl ops::Neg for &Tensor {
    type Output = Tensor;
    fn neg(self) -> Tensor {
        infallible(negate(self, None))
    }
}

impl ops::Neg for Tensor {
    type Output = Tensor;
    fn neg(self) -> Tensor {
        infallible(negate(&self, None))
    }
}
