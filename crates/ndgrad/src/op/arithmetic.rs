//! Elementwise binary arithmetic and negation.
//!
//! Binary operators broadcast their operands; their backward steps reduce
//! the output gradient back to each operand's pre-broadcast shape with
//! [`reduce_to`].

use crate::broadcast::{broadcast_shape, broadcast_to, reduce_to};
use crate::error::GradError;
use crate::op::{binary_inputs, unary_input, Operator, Primitive};
use crate::tensor::Tensor;
use ndarray::ArrayD;

/// Broadcast both operands to their common shape and combine elementwise.
fn broadcast_zip(
    x: &ArrayD<f64>,
    y: &ArrayD<f64>,
    f: impl Fn(f64, f64) -> f64,
) -> Result<ArrayD<f64>, GradError> {
    let shape = broadcast_shape(x.shape(), y.shape())?;
    let mut out = broadcast_to(x, &shape)?;
    let yb = broadcast_to(y, &shape)?;
    out.zip_mut_with(&yb, |a, &b| *a = f(*a, b));
    Ok(out)
}

pub(crate) struct Add;

impl Operator for Add {
    fn primitive(&self) -> Primitive {
        Primitive::Add
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let (x, y) = binary_inputs(inputs, Primitive::Add)?;
        broadcast_zip(x, y, |a, b| a + b)
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        add_vjp(grad, output, inputs)
    }
}

pub(crate) fn add_vjp(
    grad: &ArrayD<f64>,
    _output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    let (x, y) = binary_inputs(inputs, Primitive::Add)?;
    Ok(vec![
        Some(reduce_to(grad, x.shape())?),
        Some(reduce_to(grad, y.shape())?),
    ])
}

pub(crate) struct Subtract;

impl Operator for Subtract {
    fn primitive(&self) -> Primitive {
        Primitive::Subtract
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let (x, y) = binary_inputs(inputs, Primitive::Subtract)?;
        broadcast_zip(x, y, |a, b| a - b)
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        subtract_vjp(grad, output, inputs)
    }
}

pub(crate) fn subtract_vjp(
    grad: &ArrayD<f64>,
    _output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    let (x, y) = binary_inputs(inputs, Primitive::Subtract)?;
    Ok(vec![
        Some(reduce_to(grad, x.shape())?),
        Some(reduce_to(&grad.mapv(|v| -v), y.shape())?),
    ])
}

pub(crate) struct Multiply;

impl Operator for Multiply {
    fn primitive(&self) -> Primitive {
        Primitive::Multiply
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let (x, y) = binary_inputs(inputs, Primitive::Multiply)?;
        broadcast_zip(x, y, |a, b| a * b)
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        multiply_vjp(grad, output, inputs)
    }
}

pub(crate) fn multiply_vjp(
    grad: &ArrayD<f64>,
    _output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    let (x, y) = binary_inputs(inputs, Primitive::Multiply)?;
    let xb = broadcast_to(x, grad.shape())?;
    let yb = broadcast_to(y, grad.shape())?;
    Ok(vec![
        Some(reduce_to(&(grad * &yb), x.shape())?),
        Some(reduce_to(&(grad * &xb), y.shape())?),
    ])
}

pub(crate) struct Divide;

impl Operator for Divide {
    fn primitive(&self) -> Primitive {
        Primitive::Divide
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let (x, y) = binary_inputs(inputs, Primitive::Divide)?;
        broadcast_zip(x, y, |a, b| a / b)
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        divide_vjp(grad, output, inputs)
    }
}

pub(crate) fn divide_vjp(
    grad: &ArrayD<f64>,
    _output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    let (x, y) = binary_inputs(inputs, Primitive::Divide)?;
    let xb = broadcast_to(x, grad.shape())?;
    let yb = broadcast_to(y, grad.shape())?;
    let dx = grad / &yb;
    let dy = -(grad * &xb) / (&yb * &yb);
    Ok(vec![
        Some(reduce_to(&dx, x.shape())?),
        Some(reduce_to(&dy, y.shape())?),
    ])
}

pub(crate) struct Negate;

impl Operator for Negate {
    fn primitive(&self) -> Primitive {
        Primitive::Negate
    }

    fn forward(&self, inputs: &[&ArrayD<f64>]) -> Result<ArrayD<f64>, GradError> {
        let x = unary_input(inputs, Primitive::Negate)?;
        Ok(x.mapv(|v| -v))
    }

    fn backward(
        &self,
        grad: &ArrayD<f64>,
        output: &ArrayD<f64>,
        inputs: &[&ArrayD<f64>],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        negate_vjp(grad, output, inputs)
    }
}

pub(crate) fn negate_vjp(
    grad: &ArrayD<f64>,
    _output: &ArrayD<f64>,
    inputs: &[&ArrayD<f64>],
) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
    unary_input(inputs, Primitive::Negate)?;
    Ok(vec![Some(grad.mapv(|v| -v))])
}

/// Elementwise broadcasting addition.
pub fn add(lhs: &Tensor, rhs: &Tensor, name: Option<&str>) -> Result<Tensor, GradError> {
    Add.apply(&[lhs, rhs], name)
}

/// Elementwise broadcasting subtraction.
pub fn subtract(lhs: &Tensor, rhs: &Tensor, name: Option<&str>) -> Result<Tensor, GradError> {
    Subtract.apply(&[lhs, rhs], name)
}

/// Elementwise broadcasting multiplication.
pub fn multiply(lhs: &Tensor, rhs: &Tensor, name: Option<&str>) -> Result<Tensor, GradError> {
    Multiply.apply(&[lhs, rhs], name)
}

/// Elementwise broadcasting division.
pub fn divide(lhs: &Tensor, rhs: &Tensor, name: Option<&str>) -> Result<Tensor, GradError> {
    Divide.apply(&[lhs, rhs], name)
}

/// Elementwise negation.
pub fn negate(x: &Tensor, name: Option<&str>) -> Result<Tensor, GradError> {
    Negate.apply(&[x], name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr0, IxDyn};

    #[test]
    fn test_add_broadcasts() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let b = Tensor::from_vec(vec![10.0, 20.0, 30.0], &[3]).unwrap();
        let c = add(&a, &b, None).unwrap();
        assert_eq!(c.shape(), &[2, 3]);
        assert_eq!(
            c.data().as_slice().unwrap(),
            &[11.0, 22.0, 33.0, 14.0, 25.0, 36.0]
        );
    }

    #[test]
    fn test_add_incompatible_shapes() {
        let a = Tensor::from_vec(vec![0.0; 6], &[2, 3]).unwrap();
        let b = Tensor::from_vec(vec![0.0; 4], &[4]).unwrap();
        let err = add(&a, &b, None).unwrap_err();
        assert!(matches!(err, GradError::Broadcast { .. }));
    }

    #[test]
    fn test_divide_backward() {
        let x = arr0(6.0).into_dyn();
        let y = arr0(3.0).into_dyn();
        let out = arr0(2.0).into_dyn();
        let grad = arr0(1.0).into_dyn();
        let grads = divide_vjp(&grad, &out, &[&x, &y]).unwrap();
        assert_abs_diff_eq!(grads[0].as_ref().unwrap().sum(), 1.0 / 3.0);
        assert_abs_diff_eq!(grads[1].as_ref().unwrap().sum(), -6.0 / 9.0);
    }

    #[test]
    fn test_multiply_backward_reduces_broadcast() {
        let x = ArrayD::<f64>::ones(IxDyn(&[2, 3]));
        let y = ArrayD::<f64>::from_elem(IxDyn(&[3]), 2.0);
        let out = ArrayD::<f64>::from_elem(IxDyn(&[2, 3]), 2.0);
        let grad = ArrayD::<f64>::ones(IxDyn(&[2, 3]));
        let grads = multiply_vjp(&grad, &out, &[&x, &y]).unwrap();
        let dy = grads[1].as_ref().unwrap();
        assert_eq!(dy.shape(), &[3]);
        assert!(dy.iter().all(|&v| v == 2.0));
    }

    #[test]
    fn test_arity_checked() {
        let x = arr0(1.0).into_dyn();
        let err = Add.forward(&[&x]).unwrap_err();
        assert!(matches!(
            err,
            GradError::Arity {
                primitive: "add",
                expected: 2,
                actual: 1
            }
        ));
    }
}
