//! Gradient recording mode
//!
//! Ops only record backward operations while gradient mode is enabled.
//! Evaluation passes run under [`no_grad`] so that no graph is built and no
//! gradient can leak into the parameters.

use std::cell::Cell;

thread_local! {
    static GRAD_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// Whether ops on this thread currently record gradients
pub fn is_grad_enabled() -> bool {
    GRAD_ENABLED.with(|g| g.get())
}

/// Sets the gradient mode and restores the previous mode on drop
#[derive(Debug)]
pub struct GradModeGuard {
    previous: bool,
}

impl GradModeGuard {
    pub fn new(enabled: bool) -> Self {
        let previous = GRAD_ENABLED.with(|g| g.replace(enabled));
        Self { previous }
    }

    /// Guard that disables gradient recording
    pub fn disabled() -> Self {
        Self::new(false)
    }
}

impl Drop for GradModeGuard {
    fn drop(&mut self) {
        GRAD_ENABLED.with(|g| g.set(self.previous));
    }
}

/// Run `f` with gradient recording disabled
pub fn no_grad<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = GradModeGuard::disabled();
    f()
}
