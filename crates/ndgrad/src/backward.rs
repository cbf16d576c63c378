//! Reverse-mode gradient computation over a recorded graph.

use crate::broadcast::broadcast_to;
use crate::error::GradError;
use crate::graph::Graph;
use crate::registry;
use crate::tensor::{Tensor, TensorId};
use ndarray::ArrayD;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

impl Graph {
    /// Differentiate `target` with respect to each of `sources`.
    ///
    /// Walks the recorded nodes in reverse order, seeding the target with a
    /// gradient of ones and accumulating each backward function's output
    /// per tensor identity. Nodes outside the target's lineage are skipped;
    /// untracked inputs absorb no gradient.
    ///
    /// Returns one entry per source, `None` for sources the target does not
    /// depend on. Each computed gradient has exactly its source's shape and
    /// is also stored in the source's gradient slot.
    ///
    /// Fails with [`GradError::Differentiation`] if the target is not
    /// derived from any variable, and with
    /// [`GradError::UnregisteredDerivative`] if a reached node's primitive
    /// has no backward function.
    pub fn gradient(
        &self,
        target: &Tensor,
        sources: &[&Tensor],
    ) -> Result<Vec<Option<ArrayD<f64>>>, GradError> {
        if !target.is_tracked() {
            return Err(GradError::Differentiation {
                reason: "target is not derived from any variable",
            });
        }

        let mut grads: HashMap<TensorId, ArrayD<f64>> = HashMap::new();
        grads.insert(target.id(), ArrayD::ones(target.data().raw_dim()));

        let nodes = self.store().nodes();
        for node in nodes.iter().rev() {
            let Some(grad_out) = grads.get(&node.result_id).cloned() else {
                continue;
            };
            let vjp = registry::lookup(node.primitive).ok_or(
                GradError::UnregisteredDerivative {
                    primitive: node.primitive.name(),
                },
            )?;
            let input_values: Vec<&ArrayD<f64>> =
                node.inputs.iter().map(|input| &input.value).collect();
            let input_grads = vjp(&grad_out, &node.result, &input_values, &node.args)?;
            if input_grads.len() != node.inputs.len() {
                return Err(GradError::MalformedNode {
                    primitive: node.primitive.name(),
                });
            }

            for (input, dx) in node.inputs.iter().zip(input_grads) {
                let Some(dx) = dx else { continue };
                // An untracked input absorbs a gradient only if some other
                // path already reached it, which cannot happen for true
                // constants.
                if !input.tracked && !grads.contains_key(&input.id) {
                    continue;
                }
                let dx = if dx.shape() == input.value.shape() {
                    dx
                } else {
                    broadcast_to(&dx, input.value.shape())?
                };
                match grads.entry(input.id) {
                    Entry::Occupied(mut acc) => *acc.get_mut() += &dx,
                    Entry::Vacant(slot) => {
                        slot.insert(dx);
                    }
                }
            }
        }

        let mut results = Vec::with_capacity(sources.len());
        for source in sources {
            match grads.get(&source.id()) {
                Some(grad) => {
                    source.set_grad(grad.clone());
                    results.push(Some(grad.clone()));
                }
                None => {
                    source.clear_grad();
                    results.push(None);
                }
            }
        }
        Ok(results)
    }
}
