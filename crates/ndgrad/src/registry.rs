//! Registry mapping primitives to their backward functions.
//!
//! Every built-in primitive is registered at first use. Downstream code can
//! attach a backward function to a [`Primitive::Custom`] variant with
//! [`register`]; a recorded node whose primitive has no entry makes the
//! gradient query fail with [`GradError::UnregisteredDerivative`].

use crate::error::GradError;
use crate::op::{self, OpArgs, Primitive};
use ndarray::ArrayD;
use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

/// A backward function: maps the output gradient to one gradient per input.
///
/// Arguments are the output gradient, the recorded output value, the
/// recorded input values, and the node's auxiliary parameters. `None`
/// entries mark inputs that receive no gradient.
pub type VjpFn = fn(
    &ArrayD<f64>,
    &ArrayD<f64>,
    &[&ArrayD<f64>],
    &OpArgs,
) -> Result<Vec<Option<ArrayD<f64>>>, GradError>;

/// Table of backward functions keyed by primitive.
pub struct GradientRegistry {
    map: HashMap<Primitive, VjpFn>,
}

// Adapts backward functions that ignore the auxiliary parameters.
macro_rules! plain {
    ($f:path) => {{
        fn adapter(
            grad: &ArrayD<f64>,
            output: &ArrayD<f64>,
            inputs: &[&ArrayD<f64>],
            _args: &OpArgs,
        ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
            $f(grad, output, inputs)
        }
        adapter as VjpFn
    }};
}

impl GradientRegistry {
    /// A registry preloaded with every built-in primitive.
    pub fn with_builtins() -> Self {
        let mut map: HashMap<Primitive, VjpFn> = HashMap::new();
        map.insert(Primitive::Add, plain!(op::add_vjp));
        map.insert(Primitive::Subtract, plain!(op::subtract_vjp));
        map.insert(Primitive::Multiply, plain!(op::multiply_vjp));
        map.insert(Primitive::Divide, plain!(op::divide_vjp));
        map.insert(Primitive::Negate, plain!(op::negate_vjp));
        map.insert(Primitive::Matmul, plain!(op::matmul_vjp));
        map.insert(Primitive::Exp, plain!(op::exp_vjp));
        map.insert(Primitive::Log, plain!(op::log_vjp));
        map.insert(Primitive::Sqrt, plain!(op::sqrt_vjp));
        map.insert(Primitive::Square, plain!(op::square_vjp));
        map.insert(Primitive::Sinh, plain!(op::sinh_vjp));
        map.insert(Primitive::Cosh, plain!(op::cosh_vjp));
        map.insert(Primitive::Tanh, plain!(op::tanh_vjp));
        map.insert(Primitive::Sum, op::sum_vjp as VjpFn);
        map.insert(Primitive::Mean, op::mean_vjp as VjpFn);
        map.insert(Primitive::Reshape, plain!(op::reshape_vjp));
        map.insert(Primitive::Transpose, op::transpose_vjp as VjpFn);
        Self { map }
    }

    /// Attach (or replace) the backward function for a primitive.
    pub fn register(&mut self, primitive: Primitive, f: VjpFn) {
        self.map.insert(primitive, f);
    }

    /// The backward function for a primitive, if registered.
    pub fn lookup(&self, primitive: Primitive) -> Option<VjpFn> {
        self.map.get(&primitive).copied()
    }
}

static REGISTRY: OnceLock<RwLock<GradientRegistry>> = OnceLock::new();

fn global() -> &'static RwLock<GradientRegistry> {
    REGISTRY.get_or_init(|| RwLock::new(GradientRegistry::with_builtins()))
}

/// Look up a backward function in the process-wide registry.
pub fn lookup(primitive: Primitive) -> Option<VjpFn> {
    global()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .lookup(primitive)
}

/// Register a backward function in the process-wide registry.
///
/// Intended for [`Primitive::Custom`] extensions; registering a built-in
/// primitive replaces its backward function.
pub fn register(primitive: Primitive, f: VjpFn) {
    global()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(primitive, f);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr0;

    #[test]
    fn test_builtins_are_registered() {
        for primitive in [
            Primitive::Add,
            Primitive::Multiply,
            Primitive::Matmul,
            Primitive::Mean,
            Primitive::Tanh,
            Primitive::Transpose,
        ] {
            assert!(lookup(primitive).is_some(), "missing {primitive}");
        }
    }

    #[test]
    fn test_unknown_custom_is_absent() {
        assert!(lookup(Primitive::Custom("no_such_op")).is_none());
    }

    #[test]
    fn test_register_custom() {
        fn identity_vjp(
            grad: &ArrayD<f64>,
            _output: &ArrayD<f64>,
            _inputs: &[&ArrayD<f64>],
            _args: &OpArgs,
        ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
            Ok(vec![Some(grad.clone())])
        }

        register(Primitive::Custom("identity"), identity_vjp);
        let f = lookup(Primitive::Custom("identity")).unwrap();
        let g = arr0(2.0).into_dyn();
        let out = f(&g, &g, &[&g], &OpArgs::None).unwrap();
        assert_eq!(out[0].as_ref().unwrap().sum(), 2.0);
    }
}
