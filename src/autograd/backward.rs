//! Backward operation trait

use super::Tensor;

/// A recorded operation in the computational graph
pub trait BackwardOp {
    /// Propagate the result gradient into the direct inputs
    ///
    /// Must not recurse: the graph walk in [`super::backward`] calls every
    /// reachable op exactly once, outputs before inputs.
    fn backward(&self);

    /// Direct inputs of this operation
    fn inputs(&self) -> Vec<Tensor>;
}
