//! Differentiable probability distributions.

use crate::broadcast::broadcast_shape;
use crate::error::GradError;
use crate::op;
use crate::tensor::Tensor;
use ndarray::{ArrayD, IxDyn};
use rand::Rng;
use rand_distr::StandardNormal;

const LN_TWO_PI: f64 = 1.837_877_066_409_345_3;

/// A normal distribution with differentiable parameters.
///
/// Both the log-density and reparameterized samples are built from
/// recorded primitives, so gradients flow back into `loc` and `scale`.
pub struct Normal {
    loc: Tensor,
    scale: Tensor,
}

impl Normal {
    /// Create a normal distribution; `loc` and `scale` must broadcast
    /// together.
    pub fn new(loc: Tensor, scale: Tensor) -> Result<Self, GradError> {
        broadcast_shape(loc.shape(), scale.shape())?;
        Ok(Self { loc, scale })
    }

    /// Location parameter.
    pub fn loc(&self) -> &Tensor {
        &self.loc
    }

    /// Scale parameter.
    pub fn scale(&self) -> &Tensor {
        &self.scale
    }

    /// Elementwise log-density of `x`.
    pub fn logpdf(&self, x: &Tensor) -> Result<Tensor, GradError> {
        let centered = op::divide(&op::subtract(x, &self.loc, None)?, &self.scale, None)?;
        let quad = op::multiply(&op::square(&centered, None)?, &Tensor::scalar(0.5), None)?;
        let norm = op::add(
            &op::log(&self.scale, None)?,
            &Tensor::scalar(0.5 * LN_TWO_PI),
            None,
        )?;
        op::negate(&op::add(&quad, &norm, None)?, None)
    }

    /// Draw one reparameterized sample using the thread rng.
    pub fn sample(&self) -> Result<Tensor, GradError> {
        self.sample_with_rng(&mut rand::rng())
    }

    /// Draw one reparameterized sample `loc + scale * eps` with
    /// `eps ~ N(0, 1)`, so the sample stays differentiable in both
    /// parameters.
    pub fn sample_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Tensor, GradError> {
        let shape = broadcast_shape(self.loc.shape(), self.scale.shape())?;
        let eps = ArrayD::from_shape_simple_fn(IxDyn(&shape), || rng.sample(StandardNormal));
        let noise = Tensor::new(eps);
        op::add(&self.loc, &op::multiply(&self.scale, &noise, None)?, None)
    }
}
