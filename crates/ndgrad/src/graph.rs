//! Computation graph: recording scope and node list.
//!
//! A [`Graph`] owns the ordered list of recorded operations. Arming a graph
//! with [`Graph::scope`] makes it the active recorder for the current
//! thread; every operator applied to a tracked tensor while the scope is
//! alive appends a [`Node`]. Dropping the scope stops recording on every
//! exit path, including unwinding, while the recorded nodes stay with the
//! graph for later gradient queries.

use crate::error::GradError;
use crate::op::{OpArgs, Primitive};
use crate::tensor::TensorId;
use ndarray::ArrayD;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

/// One recorded input of a node.
#[derive(Debug, Clone)]
pub(crate) struct NodeInput {
    /// Identity of the input tensor.
    pub id: TensorId,
    /// Snapshot of the input's raw buffer at call time.
    pub value: ArrayD<f64>,
    /// Whether the input is a variable or derived from one.
    pub tracked: bool,
}

/// A recorded operator application.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    /// Identity of the result tensor; unique within one graph.
    pub result_id: TensorId,
    /// Snapshot of the result's raw buffer.
    pub result: ArrayD<f64>,
    /// The primitive that produced the result.
    pub primitive: Primitive,
    /// Ordered inputs as passed to the primitive.
    pub inputs: Vec<NodeInput>,
    /// Auxiliary parameters the backward step needs.
    pub args: OpArgs,
}

/// Shared node storage: the active scope and the owning graph both hold it.
#[derive(Default)]
pub(crate) struct NodeStore {
    nodes: RefCell<Vec<Node>>,
    recorded: RefCell<HashSet<TensorId>>,
}

impl NodeStore {
    /// Append a node, rejecting a result identity already present.
    pub(crate) fn record(&self, node: Node) -> Result<(), GradError> {
        if !self.recorded.borrow_mut().insert(node.result_id) {
            return Err(GradError::DuplicateNode {
                id: node.result_id.index(),
            });
        }
        self.nodes.borrow_mut().push(node);
        Ok(())
    }

    pub(crate) fn nodes(&self) -> std::cell::Ref<'_, Vec<Node>> {
        self.nodes.borrow()
    }
}

thread_local! {
    static ACTIVE: RefCell<Option<Rc<NodeStore>>> = const { RefCell::new(None) };
}

/// Run `f` against the active recorder, if any.
pub(crate) fn with_active_store<R>(f: impl FnOnce(&NodeStore) -> R) -> Option<R> {
    ACTIVE.with(|slot| slot.borrow().as_ref().map(|store| f(store)))
}

/// A computation graph.
///
/// # Example
///
/// ```
/// use ndgrad::{op, Graph, Tensor};
///
/// let a = Tensor::scalar_variable(-1.0);
/// let graph = Graph::new();
/// let b = {
///     let _scope = graph.scope().unwrap();
///     op::square(&a, None).unwrap()
/// };
/// let grads = graph.gradient(&b, &[&a]).unwrap();
/// assert_eq!(grads[0].as_ref().unwrap().sum(), -2.0);
/// ```
pub struct Graph {
    store: Rc<NodeStore>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            store: Rc::new(NodeStore::default()),
        }
    }

    /// Arm this graph as the thread's active recorder.
    ///
    /// Fails with [`GradError::ScopeActive`] if any scope is already active;
    /// nested scopes are never permitted. Recording stops when the returned
    /// guard drops.
    pub fn scope(&self) -> Result<GraphScope<'_>, GradError> {
        ACTIVE.with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.is_some() {
                return Err(GradError::ScopeActive);
            }
            *slot = Some(Rc::clone(&self.store));
            Ok(())
        })?;
        Ok(GraphScope {
            _graph: PhantomData,
        })
    }

    /// Number of recorded nodes.
    pub fn len(&self) -> usize {
        self.store.nodes.borrow().len()
    }

    /// Whether no nodes have been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn store(&self) -> &NodeStore {
        &self.store
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("num_nodes", &self.len())
            .field("recording", &ACTIVE.with(|slot| {
                slot.borrow()
                    .as_ref()
                    .is_some_and(|store| Rc::ptr_eq(store, &self.store))
            }))
            .finish()
    }
}

/// RAII guard for an active recording scope.
///
/// Dropping it clears the thread's active-recorder slot unconditionally.
pub struct GraphScope<'g> {
    _graph: PhantomData<&'g Graph>,
}

impl Drop for GraphScope<'_> {
    fn drop(&mut self) {
        ACTIVE.with(|slot| slot.borrow_mut().take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::square;
    use crate::tensor::Tensor;
    use ndarray::arr0;

    fn test_node(result_id: TensorId) -> Node {
        Node {
            result_id,
            result: arr0(1.0).into_dyn(),
            primitive: Primitive::Square,
            inputs: Vec::new(),
            args: OpArgs::None,
        }
    }

    #[test]
    fn test_scope_enter_exit() {
        let graph = Graph::new();
        assert!(with_active_store(|_| ()).is_none());
        {
            let _scope = graph.scope().unwrap();
            assert!(with_active_store(|_| ()).is_some());
        }
        assert!(with_active_store(|_| ()).is_none());
    }

    #[test]
    fn test_nested_scope_rejected() {
        let graph = Graph::new();
        let _scope = graph.scope().unwrap();
        assert!(matches!(graph.scope(), Err(GradError::ScopeActive)));

        let other = Graph::new();
        assert!(matches!(other.scope(), Err(GradError::ScopeActive)));
    }

    #[test]
    fn test_scope_reenter_after_exit() {
        let graph = Graph::new();
        {
            let _scope = graph.scope().unwrap();
        }
        let _scope = graph.scope().unwrap();
    }

    #[test]
    fn test_scope_cleared_on_unwind() {
        let graph = Graph::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = graph.scope().unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(with_active_store(|_| ()).is_none());
        let _scope = graph.scope().unwrap();
    }

    #[test]
    fn test_duplicate_result_rejected() {
        let graph = Graph::new();
        let a = Tensor::scalar(0.0);
        graph.store().record(test_node(a.id())).unwrap();
        let err = graph.store().record(test_node(a.id())).unwrap_err();
        assert!(matches!(err, GradError::DuplicateNode { .. }));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_operations_recorded_for_variables_only() {
        let variable = Tensor::scalar_variable(-1.0);
        let constant = Tensor::scalar(-1.0);

        let graph = Graph::new();
        {
            let _scope = graph.scope().unwrap();
            square(&variable, None).unwrap();
            square(&constant, None).unwrap();
        }
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_no_recording_outside_scope() {
        let variable = Tensor::scalar_variable(2.0);
        let graph = Graph::new();
        square(&variable, None).unwrap();
        assert!(graph.is_empty());
    }
}
