//! ndgrad - reverse-mode automatic differentiation over `ndarray` buffers.
//!
//! The engine records operator applications into a [`Graph`] while a
//! recording scope is active, then answers gradient queries by walking the
//! recorded nodes in reverse and accumulating vector-Jacobian products per
//! tensor identity.
//!
//! # Architecture
//!
//! ```text
//! Level 1: Tensor API (op module)
//!     → add, multiply, matmul, sum, ... and operator overloads
//!
//! Level 2: Recording (graph module)
//!     → Graph, GraphScope, one active recorder per thread
//!
//! Level 3: Differentiation (registry + gradient query)
//!     → per-primitive backward functions, reverse accumulation
//! ```
//!
//! # Example
//!
//! ```
//! use ndgrad::{op, Graph, Tensor};
//!
//! let x = Tensor::scalar_variable(2.0);
//! let y = Tensor::scalar_variable(3.0);
//!
//! let graph = Graph::new();
//! let loss = {
//!     let _scope = graph.scope().unwrap();
//!     let p = op::multiply(&x, &y, None).unwrap();
//!     op::square(&p, None).unwrap()
//! };
//!
//! // d (x*y)^2 / dx = 2*x*y^2
//! let grads = graph.gradient(&loss, &[&x, &y]).unwrap();
//! assert_eq!(grads[0].as_ref().unwrap().sum(), 36.0);
//! assert_eq!(grads[1].as_ref().unwrap().sum(), 24.0);
//! ```

mod backward;

pub mod broadcast;
pub mod config;
pub mod dtype;
pub mod error;
pub mod graph;
pub mod op;
pub mod optim;
pub mod registry;
pub mod stats;
pub mod tensor;

pub use config::{default_dtype, set_default_dtype};
pub use dtype::DType;
pub use error::GradError;
pub use graph::{Graph, GraphScope};
pub use op::{OpArgs, Operator, Primitive};
pub use tensor::{Tensor, TensorId};
