//! Callback system for fitting events
//!
//! Provides hooks into the fitting loop:
//! - `on_fit_begin` / `on_fit_end`
//! - `on_step_end`
//! - `on_convergence_check`
//! - `on_epoch_end`
//!
//! # Example
//!
//! ```rust
//! use ajustar::train::{CallbackAction, CallbackContext, TrainerCallback};
//!
//! struct StopAfter(usize);
//!
//! impl TrainerCallback for StopAfter {
//!     fn on_step_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
//!         if ctx.global_iter >= self.0 {
//!             CallbackAction::Stop
//!         } else {
//!             CallbackAction::Continue
//!         }
//!     }
//! }
//! ```

use super::ConvergenceCheck;
use std::cell::RefCell;
use std::rc::Rc;

/// Fitting state passed to callbacks
#[derive(Clone, Debug, Default)]
pub struct CallbackContext {
    /// Current epoch (0-indexed)
    pub epoch: usize,
    pub max_epochs: usize,
    /// Iterations completed across all epochs
    pub global_iter: usize,
    /// Loss of the latest step
    pub loss: f32,
    pub lr: f32,
    pub best_avg_loss: Option<f32>,
    pub intervals_no_change: usize,
    pub elapsed_secs: f64,
}

/// Action to take after a callback
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    Continue,
    /// End fitting after the current step
    Stop,
}

/// Hooks into fitting events
///
/// All methods have default no-op implementations.
pub trait TrainerCallback {
    fn on_fit_begin(&mut self, _ctx: &CallbackContext) -> CallbackAction {
        CallbackAction::Continue
    }

    fn on_step_end(&mut self, _ctx: &CallbackContext) -> CallbackAction {
        CallbackAction::Continue
    }

    /// Called after every convergence check
    fn on_convergence_check(
        &mut self,
        _ctx: &CallbackContext,
        _check: &ConvergenceCheck,
    ) -> CallbackAction {
        CallbackAction::Continue
    }

    fn on_epoch_end(&mut self, _ctx: &CallbackContext) -> CallbackAction {
        CallbackAction::Continue
    }

    fn on_fit_end(&mut self, _ctx: &CallbackContext) {}

    fn name(&self) -> &str {
        "TrainerCallback"
    }
}

// =============================================================================
// Progress Callback
// =============================================================================

/// Logs a progress line at check iterations that fall on the log interval
#[derive(Clone, Debug)]
pub struct ProgressCallback {
    log_interval: usize,
}

impl ProgressCallback {
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }

    fn is_due(&self, global_iter: usize) -> bool {
        global_iter >= 1 && (global_iter - 1) % self.log_interval == 0
    }
}

impl Default for ProgressCallback {
    fn default() -> Self {
        Self::new(100)
    }
}

impl TrainerCallback for ProgressCallback {
    fn on_convergence_check(
        &mut self,
        ctx: &CallbackContext,
        check: &ConvergenceCheck,
    ) -> CallbackAction {
        if self.is_due(ctx.global_iter) {
            tracing::info!(
                "Epoch = {:7} Iter. = {:6}  Current mean loss = {:5.2}  Intervals no change = {:3}",
                ctx.epoch,
                ctx.global_iter,
                check.mean_loss,
                check.intervals_no_change
            );
        }
        CallbackAction::Continue
    }

    fn on_fit_end(&mut self, ctx: &CallbackContext) {
        tracing::info!(
            "Fitting finished after {} iterations ({:.2}s)",
            ctx.global_iter,
            ctx.elapsed_secs
        );
    }

    fn name(&self) -> &str {
        "ProgressCallback"
    }
}

// =============================================================================
// Loss History
// =============================================================================

/// Records step losses and check means
///
/// Clones share the same history, so keep one clone and hand another to the
/// fitter.
#[derive(Clone, Debug, Default)]
pub struct LossHistory {
    steps: Rc<RefCell<Vec<f32>>>,
    checks: Rc<RefCell<Vec<(usize, f32)>>>,
}

impl LossHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loss of every training step, in order
    pub fn steps(&self) -> Vec<f32> {
        self.steps.borrow().clone()
    }

    /// `(global_iter, mean_loss)` of every convergence check
    pub fn checks(&self) -> Vec<(usize, f32)> {
        self.checks.borrow().clone()
    }
}

impl TrainerCallback for LossHistory {
    fn on_step_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        self.steps.borrow_mut().push(ctx.loss);
        CallbackAction::Continue
    }

    fn on_convergence_check(
        &mut self,
        ctx: &CallbackContext,
        check: &ConvergenceCheck,
    ) -> CallbackAction {
        self.checks
            .borrow_mut()
            .push((ctx.global_iter, check.mean_loss));
        CallbackAction::Continue
    }

    fn name(&self) -> &str {
        "LossHistory"
    }
}

// =============================================================================
// Callback Manager
// =============================================================================

/// Manages multiple callbacks and dispatches events
///
/// Dispatch stops at the first callback that returns `Stop`.
#[derive(Default)]
pub struct CallbackManager {
    callbacks: Vec<Box<dyn TrainerCallback>>,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<C: TrainerCallback + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.callbacks.iter().map(|cb| cb.name()).collect()
    }

    fn dispatch<F>(&mut self, mut event: F) -> CallbackAction
    where
        F: FnMut(&mut dyn TrainerCallback) -> CallbackAction,
    {
        for cb in &mut self.callbacks {
            if event(cb.as_mut()) == CallbackAction::Stop {
                tracing::debug!("{} requested stop", cb.name());
                return CallbackAction::Stop;
            }
        }
        CallbackAction::Continue
    }

    pub fn on_fit_begin(&mut self, ctx: &CallbackContext) -> CallbackAction {
        self.dispatch(|cb| cb.on_fit_begin(ctx))
    }

    pub fn on_step_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        self.dispatch(|cb| cb.on_step_end(ctx))
    }

    pub fn on_convergence_check(
        &mut self,
        ctx: &CallbackContext,
        check: &ConvergenceCheck,
    ) -> CallbackAction {
        self.dispatch(|cb| cb.on_convergence_check(ctx, check))
    }

    pub fn on_epoch_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        self.dispatch(|cb| cb.on_epoch_end(ctx))
    }

    pub fn on_fit_end(&mut self, ctx: &CallbackContext) {
        for cb in &mut self.callbacks {
            cb.on_fit_end(ctx);
        }
    }
}

impl std::fmt::Debug for CallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackManager")
            .field("callbacks", &self.names())
            .finish()
    }
}
