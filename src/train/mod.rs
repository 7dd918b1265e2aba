//! Fitting harness for latent-variable models
//!
//! This module provides:
//! - The [`LatentModel`] and [`Objective`] seams a model plugs into
//! - [`FitConfig`] with the classic harness defaults
//! - [`ConvergenceMonitor`], the rolling-window stopping rule
//! - Callbacks for progress reporting and loss history
//! - [`Fitter`]: step, epoch, evaluation, full runs and checkpoints
//!
//! # Example
//!
//! ```no_run
//! use ajustar::autograd::{mean, mul, sub, tile};
//! use ajustar::data::{Batch, ResponseTable};
//! use ajustar::optim::Adam;
//! use ajustar::train::{FitConfig, Fitter, LatentModel, LossContext, SampleCounts};
//! use ajustar::Tensor;
//!
//! struct Marginals(Vec<Tensor>);
//!
//! impl LatentModel for Marginals {
//!     type Output = Tensor;
//!
//!     fn forward(&self, batch: &Batch, _samples: SampleCounts) -> Tensor {
//!         tile(&self.0[0], batch.rows)
//!     }
//!
//!     fn parameters(&self) -> Vec<(String, Tensor)> {
//!         vec![("probs".to_string(), self.0[0].clone())]
//!     }
//!
//!     fn parameters_mut(&mut self) -> &mut [Tensor] {
//!         &mut self.0
//!     }
//! }
//!
//! let objective = |batch: &Batch, out: &Tensor, _: &LossContext| {
//!     let diff = sub(&batch.data, out);
//!     mean(&mul(&diff, &diff))
//! };
//!
//! let table = ResponseTable::load("responses.csv").unwrap();
//! let model = Marginals(vec![Tensor::zeros(10, true)]);
//! let mut fitter = Fitter::new(model, objective, Box::new(Adam::default_params(1e-2)), FitConfig::default());
//! let report = fitter.run_training(&table, &[2; 5]).unwrap();
//! ```

pub mod callback;
mod config;
mod convergence;
mod model;
mod trainer;


pub use callback::{
    CallbackAction, CallbackContext, CallbackManager, LossHistory, ProgressCallback,
    TrainerCallback,
};
pub use config::FitConfig;
pub use convergence::{ConvergenceCheck, ConvergenceMonitor};
pub use model::{LatentModel, LossContext, Objective, SampleCounts};
pub use trainer::{FitOutcome, FitReport, Fitter, TimeRecords, FITTED_MODEL};
