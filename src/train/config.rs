//! Fitting configuration

use serde::{Deserialize, Serialize};

/// Settings for [`Fitter`](super::Fitter)
///
/// The defaults reproduce the classic harness: Adam at `1e-3`, batches of
/// 32, a 100-loss window checked every 100 iterations, and convergence after
/// 100 checks without improvement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub learning_rate: f32,

    /// Emit a progress report every N iterations (on check iterations only)
    pub log_interval: usize,

    /// Iterations over which the annealing weight ramps from 0 to 1
    pub steps_anneal: usize,

    pub verbose: bool,

    pub batch_size: usize,

    pub max_epochs: usize,

    /// Monte Carlo samples per data point
    pub mc_samples: usize,

    /// Importance-weighted samples per Monte Carlo sample
    pub iw_samples: usize,

    /// Share of rows drawn into the evaluation loader
    pub eval_prop: f32,

    /// Number of recent losses averaged at each check
    pub window: usize,

    pub check_every: usize,

    /// Checks without improvement before declaring convergence
    pub patience: usize,

    /// Maximum gradient norm for clipping (None = no clipping)
    pub max_grad_norm: Option<f32>,

    /// Seed for the data split and shuffling (None = from the OS)
    pub seed: Option<u64>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            log_interval: 100,
            steps_anneal: 0,
            verbose: true,
            batch_size: 32,
            max_epochs: 3000,
            mc_samples: 1,
            iw_samples: 1,
            eval_prop: 0.9,
            window: 100,
            check_every: 100,
            patience: 100,
            max_grad_norm: None,
            seed: None,
        }
    }
}

impl FitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_learning_rate(mut self, lr: f32) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_log_interval(mut self, interval: usize) -> Self {
        self.log_interval = interval.max(1);
        self
    }

    pub fn with_steps_anneal(mut self, steps: usize) -> Self {
        self.steps_anneal = steps;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_epochs(mut self, epochs: usize) -> Self {
        self.max_epochs = epochs;
        self
    }

    /// Set Monte Carlo and importance-weighted sample counts
    pub fn with_samples(mut self, mc_samples: usize, iw_samples: usize) -> Self {
        self.mc_samples = mc_samples;
        self.iw_samples = iw_samples;
        self
    }

    pub fn with_eval_prop(mut self, prop: f32) -> Self {
        self.eval_prop = prop;
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn with_check_every(mut self, iterations: usize) -> Self {
        self.check_every = iterations.max(1);
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    /// Set gradient clipping norm
    pub fn with_grad_clip(mut self, max_norm: f32) -> Self {
        self.max_grad_norm = Some(max_norm);
        self
    }

    pub fn without_grad_clip(mut self) -> Self {
        self.max_grad_norm = None;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
