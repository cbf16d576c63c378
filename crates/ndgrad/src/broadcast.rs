//! Broadcast shape computation and broadcast-aware gradient reduction.
//!
//! Elementwise binary operators broadcast their operands with numpy-style
//! trailing alignment. Their backward steps must hand each input a gradient
//! of that input's *pre-broadcast* shape, which [`reduce_to`] produces by
//! summing over every broadcast axis.

use crate::error::GradError;
use ndarray::{ArrayD, Axis, IxDyn};

/// Shape produced by broadcasting `lhs` against `rhs`.
///
/// Shapes are aligned from the right; a dimension of size 1 (or a missing
/// leading dimension) stretches to match the other operand.
pub fn broadcast_shape(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>, GradError> {
    let ndim = lhs.len().max(rhs.len());
    let mut shape = vec![0; ndim];
    for i in 0..ndim {
        let l = if i < ndim - lhs.len() {
            1
        } else {
            lhs[i - (ndim - lhs.len())]
        };
        let r = if i < ndim - rhs.len() {
            1
        } else {
            rhs[i - (ndim - rhs.len())]
        };
        shape[i] = if l == r || r == 1 {
            l
        } else if l == 1 {
            r
        } else {
            return Err(GradError::Broadcast {
                lhs: lhs.to_vec(),
                rhs: rhs.to_vec(),
            });
        };
    }
    Ok(shape)
}

/// Broadcast an array up to `shape`, owning the result.
pub fn broadcast_to(a: &ArrayD<f64>, shape: &[usize]) -> Result<ArrayD<f64>, GradError> {
    if a.shape() == shape {
        return Ok(a.clone());
    }
    a.broadcast(IxDyn(shape))
        .map(|view| view.to_owned())
        .ok_or_else(|| GradError::Broadcast {
            lhs: a.shape().to_vec(),
            rhs: shape.to_vec(),
        })
}

/// Reduce a gradient shaped like a broadcast output back to `shape`.
///
/// Leading axes absent from the target are summed out entirely; every axis
/// where the target has size 1 but the gradient is larger is summed while
/// keeping the axis. The result has exactly the target shape.
pub fn reduce_to(grad: &ArrayD<f64>, shape: &[usize]) -> Result<ArrayD<f64>, GradError> {
    let mut g = grad.clone();
    while g.ndim() > shape.len() {
        g = g.sum_axis(Axis(0));
    }
    if g.ndim() < shape.len() {
        g = broadcast_to(&g, shape)?;
    }
    for axis in 0..shape.len() {
        if shape[axis] == 1 && g.shape()[axis] != 1 {
            g = g.sum_axis(Axis(axis)).insert_axis(Axis(axis));
        }
    }
    if g.shape() != shape {
        g = broadcast_to(&g, shape)?;
    }
    Ok(g)
}
