//! Reductions: sum and mean over all elements or a single axis.

use crate::broadcast::broadcast_to;
use crate::error::GradError;
use crate::op::{unary_input, OpArgs, Operator, Primitive};
use crate::tensor::Tensor;
use ndarray::{arr0, ArrayD, Axis, IxDyn};

/// Resolve a possibly-negative axis index against `ndim`.
fn normalize_axis(axis: isize, ndim: usize) -> Result<usize, GradError> {
    let resolved = if axis < 0 { axis + ndim as isize } else { axis };
    if resolved < 0 || resolved as usize >= ndim {
        return Err(GradError::InvalidAxis { axis, ndim });
    }
    Ok(resolved as usize)
}

/// Number of elements folded into each output element.
fn reduction_count(shape: &[usize], axis: Option<usize>) -> f64 {
    match axis {
        Some(axis) => shape[axis] as f64,
        None => shape.iter().product::<usize>() as f64,
    }
}

fn reduce_forward(
    x: &ArrayD<f64>,
    primitive: Primitive,
    axis: Option<usize>,
    keepdims: bool,
) -> Result<ArrayD<f64>, GradError> {
    Ok(match axis {
        Some(axis) => {
            if axis >= x.ndim() {
                return Err(GradError::InvalidAxis {
                    axis: axis as isize,
                    ndim: x.ndim(),
                });
            }
            let reduced = x.sum_axis(Axis(axis));
            if keepdims {
                reduced.insert_axis(Axis(axis))
            } else {
                reduced
            }
        }
        None => {
            if keepdims {
                ArrayD::from_elem(IxDyn(&vec![1; x.ndim()]), x.sum())
            } else {
                arr0(x.sum()).into_dyn()
            }
        }
    })
    .map(|out| {
        if primitive == Primitive::Mean {
            let n = reduction_count(x.shape(), axis);
            out.mapv(|v| v / n)
        } else {
            out
        }
    })
}

/// Spread an output gradient back over the reduced input shape.
fn spread_grad(
    grad: &ArrayD<f64>,
    input_shape: &[usize],
    axis: Option<usize>,
    keepdims: bool,
) -> Result<ArrayD<f64>, GradError> {
    let mut g = grad.clone();
    if let Some(axis) = axis {
        if !keepdims {
            g = g.insert_axis(Axis(axis));
        }
    }
    broadcast_to(&g, input_shape)
}

pub(crate) struct Sum {
    pub axis: Option<usize>,
    pub keepdims: bool,
}

impl Operator for Sum {
    fn primitive(&self) -> Primitive {
        Primitive::Sum
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let x = unary_input(inputs, Primitive::Sum)?;
        reduce_forward(x, Primitive::Sum, self.axis, self.keepdims)
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        sum_vjp(grad, output, inputs, &self.args())
    }

    fn args(&self) -> OpArgs {
        OpArgs::Reduce {
            axis: self.axis,
            keepdims: self.keepdims,
        }
    }
}

pub(crate) fn sum_vjp(
    grad: &ArrayD<f64>,
    _output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
    args: &OpArgs,
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    let x = unary_input(inputs, Primitive::Sum)?;
    let &OpArgs::Reduce { axis, keepdims } = args else {
        return Err(GradError::MalformedNode { primitive: "sum" });
    };
    Ok(vec![Some(spread_grad(grad, x.shape(), axis, keepdims)?)])
}

pub(crate) struct Mean {
    pub axis: Option<usize>,
    pub keepdims: bool,
}

impl Operator for Mean {
    fn primitive(&self) -> Primitive {
        Primitive::Mean
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let x = unary_input(inputs, Primitive::Mean)?;
        reduce_forward(x, Primitive::Mean, self.axis, self.keepdims)
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        mean_vjp(grad, output, inputs, &self.args())
    }

    fn args(&self) -> OpArgs {
        OpArgs::Reduce {
            axis: self.axis,
            keepdims: self.keepdims,
        }
    }
}

pub(crate) fn mean_vjp(
    grad: &ArrayD<f64>,
    _output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
    args: &OpArgs,
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    let x = unary_input(inputs, Primitive::Mean)?;
    let &OpArgs::Reduce { axis, keepdims } = args else {
        return Err(GradError::MalformedNode { primitive: "mean" });
    };
    let n = reduction_count(x.shape(), axis);
    let spread = spread_grad(grad, x.shape(), axis, keepdims)?;
    Ok(vec![Some(spread.mapv(|v| v / n))])
}

/// Sum over all elements, or over one axis.
///
/// A negative `axis` counts from the last dimension. With `keepdims` the
/// reduced axis is kept with size 1, so the result broadcasts against the
/// input.
pub fn sum(
    x: &Tensor,
    axis: Option<isize>,
    keepdims: bool,
    name: Option<&str>,
) -> Result<Tensor, GradError> {
    let axis = axis.map(|a| normalize_axis(a, x.ndim())).transpose()?;
    Sum { axis, keepdims }.apply(&[x], name)
}

/// Arithmetic mean over all elements, or over one axis.
pub fn mean(
    x: &Tensor,
    axis: Option<isize>,
    keepdims: bool,
    name: Option<&str>,
) -> Result<Tensor, GradError> {
    let axis = axis.map(|a| normalize_axis(a, x.ndim())).transpose()?;
    Mean { axis, keepdims }.apply(&[x], name)
}
