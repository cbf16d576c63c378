//! Gradient-based parameter optimization.

use crate::error::GradError;
use crate::tensor::{Tensor, TensorId};
use ndarray::ArrayD;
use std::collections::HashMap;

/// Adam optimizer with bias-corrected moment estimates.
///
/// Moment state is keyed by tensor identity, so parameters keep their
/// state across steps as long as they are updated in place.
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    iterations: u64,
    moment1: HashMap<TensorId, ArrayD<f64>>,
    moment2: HashMap<TensorId, ArrayD<f64>>,
}

fn check_range(
    name: &'static str,
    low: f64,
    high: f64,
    value: f64,
) -> Result<(), GradError> {
    if !(value > low && value < high) {
        return Err(GradError::InvalidHyperparameter {
            name,
            low,
            high,
            value,
        });
    }
    Ok(())
}

impl Adam {
    /// Create an optimizer with the usual defaults for the betas and
    /// epsilon.
    pub fn new(learning_rate: f64) -> Result<Self, GradError> {
        Self::with_betas(learning_rate, 0.9, 0.999, 1e-8)
    }

    /// Create an optimizer with explicit moment decay rates.
    pub fn with_betas(
        learning_rate: f64,
        beta1: f64,
        beta2: f64,
        epsilon: f64,
    ) -> Result<Self, GradError> {
        check_range("learning_rate", 0.0, f64::INFINITY, learning_rate)?;
        check_range("beta1", 0.0, 1.0, beta1)?;
        check_range("beta2", 0.0, 1.0, beta2)?;
        check_range("epsilon", 0.0, f64::INFINITY, epsilon)?;
        Ok(Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            iterations: 0,
            moment1: HashMap::new(),
            moment2: HashMap::new(),
        })
    }

    /// Number of completed steps.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Update every parameter in place from its gradient slot and clear
    /// the slot.
    ///
    /// Fails with [`GradError::MissingGradient`] if any parameter has no
    /// gradient, leaving all parameters untouched.
    pub fn step(&mut self, params: &mut [&mut Tensor]) -> Result<(), GradError> {
        let grads: Vec<ArrayD<f64>> = params
            .iter()
            .map(|param| {
                param.grad().ok_or_else(|| GradError::MissingGradient {
                    name: param.display_name(),
                })
            })
            .collect::<Result<_, _>>()?;

        self.iterations += 1;
        let t = self.iterations as i32;
        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);
        let alpha =
            self.learning_rate * (1.0 - beta2.powi(t)).sqrt() / (1.0 - beta1.powi(t));

        for (param, grad) in params.iter_mut().zip(grads) {
            let m = self
                .moment1
                .entry(param.id())
                .or_insert_with(|| ArrayD::zeros(grad.raw_dim()));
            let v = self
                .moment2
                .entry(param.id())
                .or_insert_with(|| ArrayD::zeros(grad.raw_dim()));
            m.zip_mut_with(&grad, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
            v.zip_mut_with(&grad, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

            let mut update = m.clone();
            update.zip_mut_with(v, |u, &v| *u = alpha * *u / (v.sqrt() + epsilon));
            *param.data_mut() -= &update;
            param.clear_grad();
        }
        Ok(())
    }
}
