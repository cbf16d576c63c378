//! Hyperbolic primitives: sinh, cosh, tanh.

use crate::error::GradError;
use crate::op::{unary_input, Operator, Primitive};
use crate::tensor::Tensor;
use ndarray::ArrayD;

pub(crate) struct Sinh;

impl Operator for Sinh {
    fn primitive(&self) -> Primitive {
        Primitive::Sinh
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let x = unary_input(inputs, Primitive::Sinh)?;
        Ok(x.mapv(f64::sinh))
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        sinh_vjp(grad, output, inputs)
    }
}

pub(crate) fn sinh_vjp(
    grad: &ArrayD<f64>,
    _output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    let x = unary_input(inputs, Primitive::Sinh)?;
    Ok(vec![Some(grad * &x.mapv(f64::cosh))])
}

pub(crate) struct Cosh;

impl Operator for Cosh {
    fn primitive(&self) -> Primitive {
        Primitive::Cosh
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let x = unary_input(inputs, Primitive::Cosh)?;
        Ok(x.mapv(f64::cosh))
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        cosh_vjp(grad, output, inputs)
    }
}

pub(crate) fn cosh_vjp(
    grad: &ArrayD<f64>,
    _output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    let x = unary_input(inputs, Primitive::Cosh)?;
    Ok(vec![Some(grad * &x.mapv(f64::sinh))])
}

pub(crate) struct Tanh;

impl Operator for Tanh {
    fn primitive(&self) -> Primitive {
        Primitive::Tanh
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let x = unary_input(inputs, Primitive::Tanh)?;
        Ok(x.mapv(f64::tanh))
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        tanh_vjp(grad, output, inputs)
    }
}

// d/dx tanh(x) = 1 - tanh(x)^2, reused from the recorded output.
pub(crate) fn tanh_vjp(
    grad: &ArrayD<f64>,
    output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    unary_input(inputs, Primitive::Tanh)?;
    Ok(vec![Some(grad * &output.mapv(|t| 1.0 - t * t))])
}

/// Elementwise hyperbolic sine.
pub fn sinh(x: &Tensor, name: Option<&str>) -> Result<Tensor, GradError> {
    Sinh.apply(&[x], name)
}

/// Elementwise hyperbolic cosine.
pub fn cosh(x: &Tensor, name: Option<&str>) -> Result<Tensor, GradError> {
    Cosh.apply(&[x], name)
}

/// Elementwise hyperbolic tangent.
pub fn tanh(x: &Tensor, name: Option<&str>) -> Result<Tensor, GradError> {
    Tanh.apply(&[x], name)
}
