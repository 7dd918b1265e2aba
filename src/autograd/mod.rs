//! Tape-based autograd engine
//!
//! Provides automatic differentiation using a computational graph with gradient tape.
//! Gradients flow through the graph in reverse topological order, so a tensor
//! that feeds several consumers receives the sum of all their contributions
//! before it propagates further.

mod backward;
mod context;
mod ops;
mod tensor;

#[cfg(test)]
mod tests;

pub use backward::BackwardOp;
pub use context::{is_grad_enabled, no_grad, GradModeGuard};
pub use ops::*;
pub use tensor::Tensor;

use ndarray::Array1;
use std::collections::HashSet;

/// Perform backward pass on a tensor
///
/// `grad_output` seeds the gradient of `tensor`; `None` seeds ones, which is
/// what a scalar loss needs.
pub fn backward(tensor: &Tensor, grad_output: Option<Array1<f32>>) {
    let seed = grad_output.unwrap_or_else(|| Array1::ones(tensor.len()));
    tensor.set_grad(seed);

    for node in topological_order(tensor).iter().rev() {
        if let Some(op) = node.backward_op() {
            op.backward();
        }
    }
}

/// Post-order walk of the graph below `root`: inputs come before outputs
fn topological_order(root: &Tensor) -> Vec<Tensor> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut stack = vec![(root.clone(), false)];

    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            order.push(node);
            continue;
        }
        if !visited.insert(node.node_id()) {
            continue;
        }
        let op = node.backward_op();
        stack.push((node, true));
        if let Some(op) = op {
            for input in op.inputs() {
                if !visited.contains(&input.node_id()) {
                    stack.push((input, false));
                }
            }
        }
    }

    order
}
