//! Rolling-window convergence detection

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Result of a convergence check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceCheck {
    /// Mean of the losses currently in the window
    pub mean_loss: f32,
    /// Whether the mean beat the previous best
    pub improved: bool,
    pub intervals_no_change: usize,
    pub converged: bool,
}

/// Tracks per-iteration losses and decides when fitting has converged
///
/// Losses go into a FIFO window. Every `check_every` iterations (at
/// `1 + k * check_every`, `k >= 1`) the window mean is compared against the
/// best mean so far; `patience` checks in a row without a strict
/// improvement mark the fit as converged.
#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    window: VecDeque<f32>,
    capacity: usize,
    check_every: usize,
    patience: usize,
    best_avg_loss: Option<f32>,
    intervals_no_change: usize,
    converged: bool,
}

impl ConvergenceMonitor {
    pub fn new(capacity: usize, check_every: usize, patience: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity + 1),
            capacity,
            check_every: check_every.max(1),
            patience,
            best_avg_loss: None,
            intervals_no_change: 0,
            converged: false,
        }
    }

    /// Whether `global_iter` is a check iteration
    pub fn is_check_iteration(&self, global_iter: usize) -> bool {
        global_iter > 1 && (global_iter - 1) % self.check_every == 0
    }

    /// Record the loss of iteration `global_iter`, checking when due
    pub fn record(&mut self, global_iter: usize, loss: f32) -> Option<ConvergenceCheck> {
        self.window.push_back(loss);
        if self.window.len() > self.capacity {
            self.window.pop_front();
        }

        if !self.is_check_iteration(global_iter) {
            return None;
        }

        let mean_loss = self.window_mean();
        let improved = match self.best_avg_loss {
            None => {
                self.best_avg_loss = Some(mean_loss);
                false
            }
            Some(best) if mean_loss < best => {
                self.best_avg_loss = Some(mean_loss);
                self.intervals_no_change = 0;
                true
            }
            Some(_) => {
                self.intervals_no_change += 1;
                if self.intervals_no_change >= self.patience {
                    self.converged = true;
                }
                false
            }
        };

        tracing::trace!(
            "Check at iteration {}: mean {:.4}, {} intervals without change",
            global_iter,
            mean_loss,
            self.intervals_no_change
        );

        Some(ConvergenceCheck {
            mean_loss,
            improved,
            intervals_no_change: self.intervals_no_change,
            converged: self.converged,
        })
    }

    /// Mean of the losses in the window, NaN when empty
    pub fn window_mean(&self) -> f32 {
        if self.window.is_empty() {
            return f32::NAN;
        }
        let total: f64 = self.window.iter().map(|&l| f64::from(l)).sum();
        (total / self.window.len() as f64) as f32
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn best_avg_loss(&self) -> Option<f32> {
        self.best_avg_loss
    }

    pub fn intervals_no_change(&self) -> usize {
        self.intervals_no_change
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.best_avg_loss = None;
        self.intervals_no_change = 0;
        self.converged = false;
    }
}

impl Default for ConvergenceMonitor {
    fn default() -> Self {
        Self::new(100, 100, 100)
    }
}
