//! Optimizer trait

use crate::Tensor;

/// Trait for optimization algorithms
///
/// Parameters are passed on every call in the same order; optimizers keep
/// per-parameter state (moments, velocities) by position.
pub trait Optimizer {
    /// Perform a single optimization step
    fn step(&mut self, params: &mut [Tensor]);

    /// Zero out all gradients
    fn zero_grad(&mut self, params: &mut [Tensor]) {
        for param in params {
            param.zero_grad();
        }
    }

    fn lr(&self) -> f32;

    fn set_lr(&mut self, lr: f32);

    /// Drop accumulated state, e.g. after parameters were reloaded
    fn reset(&mut self) {}

    /// Short name used in logs and checkpoints
    fn name(&self) -> &str;
}
