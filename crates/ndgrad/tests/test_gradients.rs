//! Integration tests for the gradient engine.
//!
//! Every analytic gradient is checked against a central-difference
//! numerical gradient of the summed output.

use approx::assert_relative_eq;
use ndgrad::{op, Graph, Tensor};

/// Compute numerical gradient using central difference.
///
/// grad_i ≈ (f(x + eps*e_i) - f(x - eps*e_i)) / (2*eps)
fn numerical_gradient<F>(f: F, x: &[f64], eps: f64) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut grad = vec![0.0; x.len()];
    let mut probe = x.to_vec();
    for i in 0..x.len() {
        probe[i] = x[i] + eps;
        let f_plus = f(&probe);
        probe[i] = x[i] - eps;
        let f_minus = f(&probe);
        probe[i] = x[i];
        grad[i] = (f_plus - f_minus) / (2.0 * eps);
    }
    grad
}

/// Check the recorded gradient of `sum(forward(x))` against the numerical
/// gradient. Seeding the output with ones is exactly the gradient of the
/// summed output, so the forward closure need not reduce to a scalar.
fn check_gradient<F>(forward: F, data: &[f64], shape: &[usize])
where
    F: Fn(&Tensor) -> Tensor,
{
    let numerical = numerical_gradient(
        |vals| {
            let t = Tensor::from_vec(vals.to_vec(), shape).unwrap();
            forward(&t).data().sum()
        },
        data,
        1e-5,
    );

    let x = Tensor::from_vec(data.to_vec(), shape).unwrap().into_variable();
    let graph = Graph::new();
    let out = {
        let _scope = graph.scope().unwrap();
        forward(&x)
    };
    let grads = graph.gradient(&out, &[&x]).unwrap();
    let analytic = grads[0].as_ref().unwrap();
    assert_eq!(analytic.shape(), shape);
    for (a, n) in analytic.iter().zip(numerical) {
        assert_relative_eq!(*a, n, epsilon = 1e-7, max_relative = 1e-4);
    }
}

/// Two-operand version of [`check_gradient`].
fn check_binary_gradient<F>(forward: F, lhs: (&[f64], &[usize]), rhs: (&[f64], &[usize]))
where
    F: Fn(&Tensor, &Tensor) -> Tensor,
{
    let numerical_lhs = numerical_gradient(
        |vals| {
            let a = Tensor::from_vec(vals.to_vec(), lhs.1).unwrap();
            let b = Tensor::from_vec(rhs.0.to_vec(), rhs.1).unwrap();
            forward(&a, &b).data().sum()
        },
        lhs.0,
        1e-5,
    );
    let numerical_rhs = numerical_gradient(
        |vals| {
            let a = Tensor::from_vec(lhs.0.to_vec(), lhs.1).unwrap();
            let b = Tensor::from_vec(vals.to_vec(), rhs.1).unwrap();
            forward(&a, &b).data().sum()
        },
        rhs.0,
        1e-5,
    );

    let a = Tensor::from_vec(lhs.0.to_vec(), lhs.1).unwrap().into_variable();
    let b = Tensor::from_vec(rhs.0.to_vec(), rhs.1).unwrap().into_variable();
    let graph = Graph::new();
    let out = {
        let _scope = graph.scope().unwrap();
        forward(&a, &b)
    };
    let grads = graph.gradient(&out, &[&a, &b]).unwrap();
    for (analytic, (numerical, shape)) in grads
        .iter()
        .zip([(numerical_lhs, lhs.1), (numerical_rhs, rhs.1)])
    {
        let analytic = analytic.as_ref().unwrap();
        assert_eq!(analytic.shape(), shape);
        for (x, n) in analytic.iter().zip(numerical) {
            assert_relative_eq!(*x, n, epsilon = 1e-7, max_relative = 1e-4);
        }
    }
}

#[test]
fn test_unary_elementwise_gradients() {
    let data = [0.3, -0.8, 1.7, -2.1];
    let shape = [2, 2];
    check_gradient(|x| op::square(x, None).unwrap(), &data, &shape);
    check_gradient(|x| op::exp(x, None).unwrap(), &data, &shape);
    check_gradient(|x| op::negate(x, None).unwrap(), &data, &shape);
    check_gradient(|x| op::sinh(x, None).unwrap(), &data, &shape);
    check_gradient(|x| op::cosh(x, None).unwrap(), &data, &shape);
    check_gradient(|x| op::tanh(x, None).unwrap(), &data, &shape);
}

#[test]
fn test_positive_domain_gradients() {
    let data = [0.4, 1.3, 2.6, 5.0];
    let shape = [4];
    check_gradient(|x| op::log(x, None).unwrap(), &data, &shape);
    check_gradient(|x| op::sqrt(x, None).unwrap(), &data, &shape);
}

#[test]
fn test_binary_broadcast_gradients() {
    let lhs = ([1.0, -2.0, 3.0, 0.5, 2.5, -1.5], [2usize, 3]);
    let rhs = ([0.7, 1.9, -0.4], [3usize]);
    check_binary_gradient(
        |a, b| op::add(a, b, None).unwrap(),
        (&lhs.0, &lhs.1),
        (&rhs.0, &rhs.1),
    );
    check_binary_gradient(
        |a, b| op::subtract(a, b, None).unwrap(),
        (&lhs.0, &lhs.1),
        (&rhs.0, &rhs.1),
    );
    check_binary_gradient(
        |a, b| op::multiply(a, b, None).unwrap(),
        (&lhs.0, &lhs.1),
        (&rhs.0, &rhs.1),
    );
    check_binary_gradient(
        |a, b| op::divide(a, b, None).unwrap(),
        (&lhs.0, &lhs.1),
        (&rhs.0, &rhs.1),
    );
}

#[test]
fn test_matmul_gradient() {
    let a: Vec<f64> = (1..=6).map(|v| v as f64).collect();
    let b: Vec<f64> = (1..=12).map(|v| 0.5 * v as f64).collect();
    check_binary_gradient(
        |x, y| op::matmul(x, y, None).unwrap(),
        (&a, &[2, 3]),
        (&b, &[3, 4]),
    );
}

#[test]
fn test_reduction_gradients() {
    let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let shape = [2, 3];
    check_gradient(|x| op::sum(x, None, false, None).unwrap(), &data, &shape);
    check_gradient(|x| op::sum(x, Some(1), true, None).unwrap(), &data, &shape);
    check_gradient(|x| op::mean(x, None, false, None).unwrap(), &data, &shape);
    check_gradient(|x| op::mean(x, Some(0), false, None).unwrap(), &data, &shape);
}

#[test]
fn test_shape_gradients_flow_through() {
    let data: Vec<f64> = (0..24).map(|v| 0.1 * v as f64).collect();
    check_gradient(
        |x| {
            let r = op::reshape(x, &[6, -1], None).unwrap();
            op::square(&r, None).unwrap()
        },
        &data,
        &[2, 3, 4],
    );
    check_gradient(
        |x| {
            let t = op::transpose(x, Some(&[2, 0, 1]), None).unwrap();
            op::exp(&t, None).unwrap()
        },
        &data,
        &[2, 3, 4],
    );
}

#[test]
fn test_composite_expression_gradient() {
    // tanh(x^2 / 2 + sqrt(exp(x)))
    let data = [0.2, -0.6, 1.1, 0.9];
    check_gradient(
        |x| {
            let sq = op::divide(
                &op::square(x, None).unwrap(),
                &Tensor::scalar(2.0),
                None,
            )
            .unwrap();
            let rhs = op::sqrt(&op::exp(x, None).unwrap(), None).unwrap();
            op::tanh(&op::add(&sq, &rhs, None).unwrap(), None).unwrap()
        },
        &data,
        &[4],
    );
}

#[test]
fn test_mean_squared_error_gradient() {
    let pred = [1.0, 2.5, -0.5, 4.0];
    let target = Tensor::from_vec(vec![1.5, 2.0, 0.0, 3.0], &[4]).unwrap();
    check_gradient(
        |x| {
            let diff = op::subtract(x, &target, None).unwrap();
            op::mean(&op::square(&diff, None).unwrap(), None, false, None).unwrap()
        },
        &pred,
        &[4],
    );
}
