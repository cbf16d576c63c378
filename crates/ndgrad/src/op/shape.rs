//! Shape manipulation: reshape and transpose.

use crate::error::GradError;
use crate::op::{unary_input, OpArgs, Operator, Primitive};
use crate::tensor::Tensor;
use ndarray::{ArrayD, IxDyn};

/// Copy a buffer into a new row-major shape.
fn reshaped(a: &ArrayD<f64>, shape: &[usize]) -> Result<ArrayD<f64>, GradError> {
    let actual = a.len();
    ArrayD::from_shape_vec(IxDyn(shape), a.iter().copied().collect()).map_err(|_| {
        GradError::ShapeMismatch {
            expected: shape.iter().product(),
            actual,
        }
    })
}

/// Resolve a requested shape against the element count, inferring at most
/// one `-1` dimension.
fn resolve_shape(newshape: &[isize], len: usize) -> Result<Vec<usize>, GradError> {
    let invalid = |reason| GradError::InvalidShape {
        shape: newshape.to_vec(),
        reason,
    };
    let mut inferred = None;
    let mut known = 1usize;
    for (i, &dim) in newshape.iter().enumerate() {
        if dim == -1 {
            if inferred.replace(i).is_some() {
                return Err(invalid("at most one dimension may be -1"));
            }
        } else if dim < 0 {
            return Err(invalid("dimensions must be non-negative or -1"));
        } else {
            known *= dim as usize;
        }
    }
    let mut shape: Vec<usize> = newshape.iter().map(|&d| d.max(0) as usize).collect();
    if let Some(i) = inferred {
        if known == 0 || len % known != 0 {
            return Err(invalid("cannot infer the -1 dimension"));
        }
        shape[i] = len / known;
    }
    Ok(shape)
}

pub(crate) struct Reshape {
    pub shape: Vec<usize>,
}

impl Operator for Reshape {
    fn primitive(&self) -> Primitive {
        Primitive::Reshape
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let x = unary_input(inputs, Primitive::Reshape)?;
        reshaped(x, &self.shape)
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        reshape_vjp(grad, output, inputs)
    }
}

// The gradient flows back unchanged, reshaped to the input's layout.
pub(crate) fn reshape_vjp(
    grad: &ArrayD<f64>,
    _output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    let x = unary_input(inputs, Primitive::Reshape)?;
    Ok(vec![Some(reshaped(grad, x.shape())?)])
}

/// Validate that `axes` is a permutation of `0..ndim`.
fn check_permutation(axes: &[usize], ndim: usize) -> Result<(), GradError> {
    let mut seen = vec![false; ndim];
    let valid = axes.len() == ndim
        && axes
            .iter()
            .all(|&a| a < ndim && !std::mem::replace(&mut seen[a], true));
    if !valid {
        return Err(GradError::InvalidPermutation {
            perm: axes.to_vec(),
            ndim,
        });
    }
    Ok(())
}

fn permute(a: &ArrayD<f64>, axes: Option<&[usize]>) -> Result<ArrayD<f64>, GradError> {
    Ok(match axes {
        None => a.clone().reversed_axes(),
        Some(axes) => {
            check_permutation(axes, a.ndim())?;
            a.clone().permuted_axes(axes)
        }
    })
}

pub(crate) struct Transpose {
    pub axes: Option<Vec<usize>>,
}

impl Operator for Transpose {
    fn primitive(&self) -> Primitive {
        Primitive::Transpose
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let x = unary_input(inputs, Primitive::Transpose)?;
        permute(x, self.axes.as_deref())
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        transpose_vjp(grad, output, inputs, &self.args())
    }

    fn args(&self) -> OpArgs {
        OpArgs::Permute {
            axes: self.axes.clone(),
        }
    }
}

// The gradient flows back through the inverse permutation.
pub(crate) fn transpose_vjp(
    grad: &ArrayD<f64>,
    _output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
    args: &OpArgs,
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    unary_input(inputs, Primitive::Transpose)?;
    let OpArgs::Permute { axes } = args else {
        return Err(GradError::MalformedNode {
            primitive: "transpose",
        });
    };
    let dx = match axes {
        None => grad.clone().reversed_axes(),
        Some(axes) => {
            check_permutation(axes, grad.ndim())?;
            let mut inverse = vec![0; axes.len()];
            for (i, &a) in axes.iter().enumerate() {
                inverse[a] = i;
            }
            grad.clone().permuted_axes(&inverse[..])
        }
    };
    Ok(vec![Some(dx)])
}

/// Reinterpret a tensor's elements in a new row-major shape.
///
/// One dimension may be `-1` and is inferred from the element count.
pub fn reshape(x: &Tensor, newshape: &[isize], name: Option<&str>) -> Result<Tensor, GradError> {
    let shape = resolve_shape(newshape, x.len())?;
    Reshape { shape }.apply(&[x], name)
}

/// Permute a tensor's axes; `None` reverses them all.
pub fn transpose(
    x: &Tensor,
    axes: Option<&[usize]>,
    name: Option<&str>,
) -> Result<Tensor, GradError> {
    Transpose {
        axes: axes.map(<[usize]>::to_vec),
    }
    .apply(&[x], name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reshape_with_inference() {
        let x = Tensor::from_vec((0..12).map(f64::from).collect(), &[3, 4]).unwrap();
        let y = reshape(&x, &[2, -1], None).unwrap();
        assert_eq!(y.shape(), &[2, 6]);

        let err = reshape(&x, &[-1, -1], None).unwrap_err();
        assert!(matches!(err, GradError::InvalidShape { .. }));

        let err = reshape(&x, &[5, -1], None).unwrap_err();
        assert!(matches!(err, GradError::InvalidShape { .. }));
    }

    #[test]
    fn test_reshape_wrong_count() {
        let x = Tensor::from_vec(vec![0.0; 6], &[2, 3]).unwrap();
        let err = reshape(&x, &[4, 2], None).unwrap_err();
        assert!(matches!(
            err,
            GradError::ShapeMismatch {
                expected: 8,
                actual: 6
            }
        ));
    }

    #[test]
    fn test_transpose_reverses_axes() {
        let x = Tensor::from_vec((0..24).map(f64::from).collect(), &[2, 3, 4]).unwrap();
        let y = transpose(&x, None, None).unwrap();
        assert_eq!(y.shape(), &[4, 3, 2]);
    }

    #[test]
    fn test_transpose_explicit_permutation() {
        let x = Tensor::from_vec((0..24).map(f64::from).collect(), &[2, 3, 4]).unwrap();
        let y = transpose(&x, Some(&[1, 0, 2]), None).unwrap();
        assert_eq!(y.shape(), &[3, 2, 4]);

        let err = transpose(&x, Some(&[0, 0, 1]), None).unwrap_err();
        assert!(matches!(err, GradError::InvalidPermutation { .. }));

        let err = transpose(&x, Some(&[0, 1]), None).unwrap_err();
        assert!(matches!(err, GradError::InvalidPermutation { .. }));
    }

    #[test]
    fn test_transpose_backward_inverts() {
        let x = ArrayD::<f64>::zeros(IxDyn(&[2, 3, 4]));
        let grad = ArrayD::<f64>::ones(IxDyn(&[3, 4, 2]));
        let args = OpArgs::Permute {
            axes: Some(vec![1, 2, 0]),
        };
        let out = ArrayD::<f64>::zeros(IxDyn(&[3, 4, 2]));
        let grads = transpose_vjp(&grad, &out, &[&x], &args).unwrap();
        assert_eq!(grads[0].as_ref().unwrap().shape(), &[2, 3, 4]);
    }
}
