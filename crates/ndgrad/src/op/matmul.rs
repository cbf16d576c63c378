//! 2-D matrix multiplication.

use crate::error::GradError;
use crate::op::{binary_inputs, Operator, Primitive};
use crate::tensor::Tensor;
use ndarray::{Array2, ArrayD};

/// View a dynamic array as a matrix, rejecting any other rank.
fn as_matrix(a: &ArrayD<f64>) -> Result<Array2<f64>, GradError> {
    a.clone()
        .into_dimensionality()
        .map_err(|_| GradError::RankMismatch {
            expected: 2,
            actual: a.ndim(),
        })
}

pub(crate) struct Matmul;

impl Operator for Matmul {
    fn primitive(&self) -> Primitive {
        Primitive::Matmul
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let (x, y) = binary_inputs(inputs, Primitive::Matmul)?;
        let x2 = as_matrix(x)?;
        let y2 = as_matrix(y)?;
        if x2.ncols() != y2.nrows() {
            return Err(GradError::IncompatibleMatmul {
                lhs: x.shape().to_vec(),
                rhs: y.shape().to_vec(),
            });
        }
        Ok(x2.dot(&y2).into_dyn())
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        matmul_vjp(grad, output, inputs)
    }
}

// d(x @ y) propagates as dx = g @ y^T and dy = x^T @ g.
pub(crate) fn matmul_vjp(
    grad: &ArrayD<f64>,
    _output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    let (x, y) = binary_inputs(inputs, Primitive::Matmul)?;
    let x2 = as_matrix(x)?;
    let y2 = as_matrix(y)?;
    let g2 = as_matrix(grad)?;
    let dx = g2.dot(&y2.t()).into_dyn();
    let dy = x2.t().dot(&g2).into_dyn();
    Ok(vec![Some(dx), Some(dy)])
}

/// Matrix product of two 2-D tensors.
pub fn matmul(lhs: &Tensor, rhs: &Tensor, name: Option<&str>) -> Result<Tensor, GradError> {
    Matmul.apply(&[lhs, rhs], name)
}
