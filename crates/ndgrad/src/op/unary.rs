//! Elementwise unary primitives: exp, log, sqrt, square.

use crate::error::GradError;
use crate::op::{unary_input, Operator, Primitive};
use crate::tensor::Tensor;
use ndarray::ArrayD;

pub(crate) struct Exp;

impl Operator for Exp {
    fn primitive(&self) -> Primitive {
        Primitive::Exp
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let x = unary_input(inputs, Primitive::Exp)?;
        Ok(x.mapv(f64::exp))
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        exp_vjp(grad, output, inputs)
    }
}

// d/dx exp(x) = exp(x), reused from the recorded output.
pub(crate) fn exp_vjp(
    grad: &ArrayD<f64>,
    output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    unary_input(inputs, Primitive::Exp)?;
    Ok(vec![Some(grad * output)])
}

pub(crate) struct Log;

impl Operator for Log {
    fn primitive(&self) -> Primitive {
        Primitive::Log
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let x = unary_input(inputs, Primitive::Log)?;
        Ok(x.mapv(f64::ln))
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        log_vjp(grad, output, inputs)
    }
}

pub(crate) fn log_vjp(
    grad: &ArrayD<f64>,
    _output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    let x = unary_input(inputs, Primitive::Log)?;
    Ok(vec![Some(grad / x)])
}

pub(crate) struct Sqrt;

impl Operator for Sqrt {
    fn primitive(&self) -> Primitive {
        Primitive::Sqrt
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let x = unary_input(inputs, Primitive::Sqrt)?;
        Ok(x.mapv(f64::sqrt))
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        sqrt_vjp(grad, output, inputs)
    }
}

pub(crate) fn sqrt_vjp(
    grad: &ArrayD<f64>,
    output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    unary_input(inputs, Primitive::Sqrt)?;
    Ok(vec![Some(grad * &output.mapv(|v| 0.5 / v))])
}

pub(crate) struct Square;

impl Operator for Square {
    fn primitive(&self) -> Primitive {
        Primitive::Square
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let x = unary_input(inputs, Primitive::Square)?;
        Ok(x.mapv(|v| v * v))
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        square_vjp(grad, output, inputs)
    }
}

pub(crate) fn square_vjp(
    grad: &ArrayD<f64>,
    _output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    let x = unary_input(inputs, Primitive::Square)?;
    Ok(vec![Some(grad * &x.mapv(|v| 2.0 * v))])
}

/// Elementwise exponential.
pub fn exp(x: &Tensor, name: Option<&str>) -> Result<Tensor, GradError> {
    Exp.apply(&[x], name)
}

/// Elementwise natural logarithm.
pub fn log(x: &Tensor, name: Option<&str>) -> Result<Tensor, GradError> {
    Log.apply(&[x], name)
}

/// Elementwise square root.
pub fn sqrt(x: &Tensor, name: Option<&str>) -> Result<Tensor, GradError> {
    Sqrt.apply(&[x], name)
}

/// Elementwise square.
pub fn square(x: &Tensor, name: Option<&str>) -> Result<Tensor, GradError> {
    Square.apply(&[x], name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr0;

    #[test]
    fn test_forward_values() {
        let x = Tensor::scalar(4.0);
        assert_abs_diff_eq!(exp(&x, None).unwrap().data().sum(), 4.0_f64.exp());
        assert_abs_diff_eq!(log(&x, None).unwrap().data().sum(), 4.0_f64.ln());
        assert_abs_diff_eq!(sqrt(&x, None).unwrap().data().sum(), 2.0);
        assert_abs_diff_eq!(square(&x, None).unwrap().data().sum(), 16.0);
    }

    #[test]
    fn test_square_backward() {
        let x = arr0(-1.0).into_dyn();
        let out = arr0(1.0).into_dyn();
        let grad = arr0(1.0).into_dyn();
        let grads = square_vjp(&grad, &out, &[&x]).unwrap();
        assert_abs_diff_eq!(grads[0].as_ref().unwrap().sum(), -2.0);
    }

    #[test]
    fn test_sqrt_backward_uses_output() {
        let x = arr0(9.0).into_dyn();
        let out = arr0(3.0).into_dyn();
        let grad = arr0(1.0).into_dyn();
        let grads = sqrt_vjp(&grad, &out, &[&x]).unwrap();
        assert_abs_diff_eq!(grads[0].as_ref().unwrap().sum(), 0.5 / 3.0);
    }
}
