//! The fitting harness

use super::callback::{CallbackAction, CallbackContext, CallbackManager, TrainerCallback};
use super::{
    ConvergenceCheck, ConvergenceMonitor, FitConfig, LatentModel, LossContext, Objective,
    ProgressCallback, SampleCounts,
};
use crate::autograd::{backward, is_grad_enabled, no_grad};
use crate::data::{Batch, DataLoader, ResponseDataset, ResponseTable, Split};
use crate::io::{load_checkpoint, save_checkpoint, Checkpoint, CheckpointMetadata, SaveConfig};
use crate::optim::{clip_grad_norm, Optimizer};
use crate::{Error, Result};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Label under which `run_training` records its wall-clock time
pub const FITTED_MODEL: &str = "Fitted Model";

/// Why fitting ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitOutcome {
    /// The convergence monitor ran out of patience
    Converged,
    /// A step produced a NaN or infinite loss
    NonFiniteLoss,
    /// `max_epochs` passed without convergence
    MaxEpochs,
    /// A callback asked to stop
    Stopped,
}

/// Summary of a `run_training` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub outcome: FitOutcome,
    /// Epochs started during this call
    pub epochs: usize,
    pub global_iter: usize,
    pub best_avg_loss: Option<f32>,
    pub elapsed_secs: f64,
}

/// Named wall-clock timings in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRecords(BTreeMap<String, f64>);

impl TimeRecords {
    /// Store `secs` rounded to two decimals
    pub fn record(&mut self, label: impl Into<String>, secs: f64) {
        self.0.insert(label.into(), (secs * 100.0).round() / 100.0);
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.0.get(label).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Fits a [`LatentModel`] against an [`Objective`]
///
/// Owns the fitting bookkeeping: the iteration counter, the convergence
/// flag, the convergence monitor and the timings.
///
/// # Example
///
/// ```no_run
/// use ajustar::data::ResponseTable;
/// use ajustar::optim::Adam;
/// use ajustar::train::{FitConfig, Fitter};
/// # use ajustar::data::Batch;
/// # use ajustar::train::{LatentModel, LossContext, SampleCounts};
/// # use ajustar::Tensor;
/// # struct Model(Vec<Tensor>);
/// # impl LatentModel for Model {
/// #     type Output = Tensor;
/// #     fn forward(&self, _: &Batch, _: SampleCounts) -> Tensor { self.0[0].clone() }
/// #     fn parameters(&self) -> Vec<(String, Tensor)> { vec![("w".into(), self.0[0].clone())] }
/// #     fn parameters_mut(&mut self) -> &mut [Tensor] { &mut self.0 }
/// # }
/// # let model = Model(vec![Tensor::zeros(1, true)]);
/// # let objective = |_: &Batch, out: &Tensor, _: &LossContext| ajustar::autograd::sum(out);
///
/// let table = ResponseTable::load("responses.csv").unwrap();
/// let config = FitConfig::default().with_seed(0);
/// let optimizer = Box::new(Adam::default_params(config.learning_rate));
///
/// let mut fitter = Fitter::new(model, objective, optimizer, config);
/// let report = fitter.run_training(&table, &[5; 10]).unwrap();
/// println!("{:?} after {} iterations", report.outcome, report.global_iter);
/// ```
pub struct Fitter<M, L>
where
    M: LatentModel,
    L: Objective<M::Output>,
{
    model: M,
    objective: L,
    optimizer: Box<dyn Optimizer>,
    config: FitConfig,
    monitor: ConvergenceMonitor,
    callbacks: CallbackManager,
    save_config: SaveConfig,
    global_iter: usize,
    converged: bool,
    stop_requested: bool,
    training: bool,
    outcome: Option<FitOutcome>,
    timings: TimeRecords,
    eval_loader: Option<DataLoader>,
    start_time: Option<Instant>,
}

impl<M, L> Fitter<M, L>
where
    M: LatentModel,
    L: Objective<M::Output>,
{
    /// Create a fitter; a verbose config installs a [`ProgressCallback`]
    pub fn new(model: M, objective: L, optimizer: Box<dyn Optimizer>, config: FitConfig) -> Self {
        let monitor = ConvergenceMonitor::new(config.window, config.check_every, config.patience);
        let mut callbacks = CallbackManager::new();
        if config.verbose {
            callbacks.add(ProgressCallback::new(config.log_interval));
        }

        let mut fitter = Self {
            model,
            objective,
            optimizer,
            config,
            monitor,
            callbacks,
            save_config: SaveConfig::default(),
            global_iter: 0,
            converged: false,
            stop_requested: false,
            training: true,
            outcome: None,
            timings: TimeRecords::default(),
            eval_loader: None,
            start_time: None,
        };
        fitter.set_training(true);
        fitter
    }

    /// Checkpoint format used by `save_model` and `load_model`
    pub fn with_save_config(mut self, save_config: SaveConfig) -> Self {
        self.save_config = save_config;
        self
    }

    pub fn add_callback<C: TrainerCallback + 'static>(&mut self, callback: C) {
        self.callbacks.add(callback);
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    pub fn monitor(&self) -> &ConvergenceMonitor {
        &self.monitor
    }

    pub fn global_iter(&self) -> usize {
        self.global_iter
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn outcome(&self) -> Option<FitOutcome> {
        self.outcome
    }

    pub fn timings(&self) -> &TimeRecords {
        &self.timings
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn lr(&self) -> f32 {
        self.optimizer.lr()
    }

    pub fn set_lr(&mut self, lr: f32) {
        self.optimizer.set_lr(lr);
    }

    /// Switch the fitter and the model between training and evaluation mode
    pub fn set_training(&mut self, training: bool) {
        self.training = training;
        self.model.set_training(training);
    }

    /// Clear the bookkeeping so the next `run_training` starts afresh
    ///
    /// Model parameters are left as they are.
    pub fn reset(&mut self) {
        self.global_iter = 0;
        self.converged = false;
        self.stop_requested = false;
        self.outcome = None;
        self.monitor.reset();
        self.optimizer.reset();
        self.eval_loader = None;
    }

    /// Weight of the annealed regularizer for the current iteration
    pub fn annealing_factor(&self) -> f32 {
        if self.training && self.config.steps_anneal > 0 {
            (self.global_iter as f32 / self.config.steps_anneal as f32).min(1.0)
        } else {
            1.0
        }
    }

    fn sample_counts(&self) -> SampleCounts {
        SampleCounts {
            mc_samples: self.config.mc_samples,
            iw_samples: self.config.iw_samples,
        }
    }

    /// One fitting iteration on `batch`, returning its loss
    ///
    /// In training mode the gradients are cleared, and backward plus the
    /// optimizer update only run when the loss is finite. In evaluation mode
    /// this is a forward pass and a loss only.
    pub fn step(&mut self, batch: &Batch) -> f32 {
        if self.training {
            self.optimizer.zero_grad(self.model.parameters_mut());
        }

        let samples = self.sample_counts();
        let output = self.model.forward(batch, samples);
        let ctx = LossContext {
            mc_samples: samples.mc_samples,
            iw_samples: samples.iw_samples,
            anneal_weight: self.annealing_factor(),
            training: self.training,
        };
        let loss = self.objective.loss(batch, &output, &ctx);
        let value = loss.item();

        if self.training && value.is_finite() && is_grad_enabled() {
            backward(&loss, None);

            let params = self.model.parameters_mut();
            if let Some(max_norm) = self.config.max_grad_norm {
                let norm = clip_grad_norm(params, max_norm);
                tracing::trace!("Gradient norm {:.4} (max {})", norm, max_norm);
            }
            self.optimizer.step(params);
        }

        value
    }

    fn build_context(&self, epoch: usize, loss: f32) -> CallbackContext {
        CallbackContext {
            epoch,
            max_epochs: self.config.max_epochs,
            global_iter: self.global_iter,
            loss,
            lr: self.lr(),
            best_avg_loss: self.monitor.best_avg_loss(),
            intervals_no_change: self.monitor.intervals_no_change(),
            elapsed_secs: self
                .start_time
                .map(|t| t.elapsed().as_secs_f64())
                .unwrap_or(0.0),
        }
    }

    fn should_stop(&self) -> bool {
        self.converged || self.stop_requested
    }

    /// Fit for one pass over `loader`, returning the mean step loss
    ///
    /// Stops early on convergence, on a non-finite loss or when a callback
    /// asks to. Returns 0 when no batch was run.
    pub fn train_epoch(&mut self, loader: &mut DataLoader, epoch: usize) -> f32 {
        self.set_training(true);

        let mut total_loss = 0.0;
        let mut num_steps = 0usize;

        for batch in loader.batches() {
            if self.should_stop() {
                break;
            }

            self.global_iter += 1;
            let loss = self.step(&batch);

            if !loss.is_finite() {
                tracing::warn!(
                    "NaN loss obtained, ending fitting. \
                     Consider increasing batch size or reducing learning rate."
                );
                self.converged = true;
                self.outcome = Some(FitOutcome::NonFiniteLoss);
                break;
            }

            total_loss += loss;
            num_steps += 1;

            if self.global_iter >= self.config.steps_anneal {
                if let Some(check) = self.monitor.record(self.global_iter, loss) {
                    self.handle_check(epoch, loss, &check);
                }
            }

            let ctx = self.build_context(epoch, loss);
            if self.callbacks.on_step_end(&ctx) == CallbackAction::Stop {
                self.request_stop();
            }
        }

        if num_steps > 0 {
            total_loss / num_steps as f32
        } else {
            0.0
        }
    }

    fn handle_check(&mut self, epoch: usize, loss: f32, check: &ConvergenceCheck) {
        if check.converged && !self.converged {
            self.converged = true;
            self.outcome = Some(FitOutcome::Converged);
            tracing::info!(
                "Converged at iteration {} (best mean loss {:.4})",
                self.global_iter,
                self.monitor.best_avg_loss().unwrap_or(check.mean_loss)
            );
        }

        let ctx = self.build_context(epoch, loss);
        if self.callbacks.on_convergence_check(&ctx, check) == CallbackAction::Stop {
            self.request_stop();
        }
    }

    fn request_stop(&mut self) {
        self.stop_requested = true;
        if self.outcome.is_none() {
            self.outcome = Some(FitOutcome::Stopped);
        }
    }

    /// Summed loss over every batch of `loader`, without updating anything
    ///
    /// Runs in evaluation mode with gradient tracking off and restores
    /// training mode afterwards.
    pub fn evaluate(&mut self, loader: &mut DataLoader) -> f32 {
        self.set_training(false);
        let eval_loss = no_grad(|| {
            loader
                .batches()
                .iter()
                .map(|batch| self.step(batch))
                .sum::<f32>()
        });
        self.set_training(true);
        eval_loss
    }

    /// Evaluate on the hold-out rows drawn by the last `run_training`
    pub fn evaluate_holdout(&mut self) -> Option<f32> {
        let mut loader = self.eval_loader.take()?;
        let loss = self.evaluate(&mut loader);
        self.eval_loader = Some(loader);
        Some(loss)
    }

    /// Fit on every row of `table` until convergence or `max_epochs`
    ///
    /// `categories[j]` is the number of response categories of column `j`;
    /// their sum must match the model's input width when the model reports
    /// one. A hold-out loader of `eval_prop` of the rows is kept for
    /// [`Fitter::evaluate_holdout`].
    pub fn run_training(&mut self, table: &ResponseTable, categories: &[usize]) -> Result<FitReport> {
        let start = Instant::now();
        self.start_time = Some(start);

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let train_set = ResponseDataset::new(table, categories, Split::Full, &mut rng)?;
        let eval_set = ResponseDataset::new(
            table,
            categories,
            Split::Holdout {
                proportion: self.config.eval_prop,
            },
            &mut rng,
        )?;

        if train_set.is_empty() {
            return Err(Error::InvalidParameter(
                "response table has no rows to fit".to_string(),
            ));
        }

        let input_dim = self.model.architecture().input_dim;
        if input_dim != 0 && input_dim != train_set.width() {
            return Err(Error::ShapeMismatch {
                expected: vec![input_dim],
                got: vec![train_set.width()],
            });
        }

        let batch_size = self.config.batch_size;
        let (mut train_loader, eval_loader) = match self.config.seed {
            Some(seed) => (
                DataLoader::seeded(train_set, batch_size, true, seed),
                DataLoader::seeded(eval_set, batch_size, true, seed.wrapping_add(1)),
            ),
            None => (
                DataLoader::new(train_set, batch_size, true),
                DataLoader::new(eval_set, batch_size, true),
            ),
        };
        tracing::info!(
            "Fitting on {} rows ({} batches per epoch), {} rows held out for evaluation",
            train_loader.dataset().len(),
            train_loader.num_batches(),
            eval_loader.dataset().len()
        );
        self.eval_loader = Some(eval_loader);
        self.stop_requested = false;

        let ctx = self.build_context(0, f32::NAN);
        if self.callbacks.on_fit_begin(&ctx) == CallbackAction::Stop {
            self.request_stop();
        }

        let mut epoch = 0;
        while !self.should_stop() {
            self.train_epoch(&mut train_loader, epoch);
            epoch += 1;

            let ctx = self.build_context(epoch - 1, f32::NAN);
            if self.callbacks.on_epoch_end(&ctx) == CallbackAction::Stop {
                self.request_stop();
            }

            if epoch >= self.config.max_epochs && !self.should_stop() {
                tracing::warn!("Failed to converge within {} epochs.", self.config.max_epochs);
                self.outcome = Some(FitOutcome::MaxEpochs);
                break;
            }
        }

        let elapsed = start.elapsed().as_secs_f64();
        self.timings.record(FITTED_MODEL, elapsed);

        let ctx = self.build_context(epoch.saturating_sub(1), f32::NAN);
        self.callbacks.on_fit_end(&ctx);

        Ok(FitReport {
            outcome: self.outcome.unwrap_or(FitOutcome::Stopped),
            epochs: epoch,
            global_iter: self.global_iter,
            best_avg_loss: self.monitor.best_avg_loss(),
            elapsed_secs: elapsed,
        })
    }

    fn checkpoint_path(&self, name: &str, dir: &Path) -> PathBuf {
        dir.join(format!("{name}.{}", self.save_config.format.extension()))
    }

    /// Save the model parameters to `dir/name.<ext>`
    pub fn save_model(&self, name: &str, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.checkpoint_path(name, dir.as_ref());
        let metadata = CheckpointMetadata::new(name, self.model.architecture()).with_progress(
            self.global_iter,
            self.monitor.best_avg_loss(),
            self.converged,
        );
        let checkpoint = Checkpoint::new(metadata, self.model.parameters());
        save_checkpoint(&checkpoint, &path, &self.save_config)?;

        tracing::info!("Saved model '{}' to {}", name, path.display());
        Ok(path)
    }

    /// Load parameters saved by [`Fitter::save_model`]
    ///
    /// Every model parameter must be present with the same length and the
    /// checkpoint may not hold extra ones; on any mismatch the model is left
    /// untouched.
    pub fn load_model(&mut self, name: &str, dir: impl AsRef<Path>) -> Result<()> {
        let path = self.checkpoint_path(name, dir.as_ref());
        let checkpoint = load_checkpoint(&path)?;

        let mut stored: HashMap<&str, &Array1<f32>> = HashMap::new();
        for (n, t) in &checkpoint.parameters {
            if stored.insert(n.as_str(), t.data()).is_some() {
                return Err(Error::Checkpoint(format!(
                    "duplicate parameter '{n}' in {}",
                    path.display()
                )));
            }
        }

        let expected = self.model.parameters();
        let mut values = Vec::with_capacity(expected.len());
        for (name, tensor) in &expected {
            let data = stored.remove(name.as_str()).ok_or_else(|| {
                Error::Checkpoint(format!("missing parameter '{name}' in {}", path.display()))
            })?;
            if data.len() != tensor.len() {
                return Err(Error::Checkpoint(format!(
                    "parameter '{name}' has {} values, model expects {}",
                    data.len(),
                    tensor.len()
                )));
            }
            values.push(data.clone());
        }

        if !stored.is_empty() {
            let mut unexpected: Vec<&str> = stored.into_keys().collect();
            unexpected.sort_unstable();
            return Err(Error::Checkpoint(format!(
                "unexpected parameters: {}",
                unexpected.join(", ")
            )));
        }

        let params = self.model.parameters_mut();
        if params.len() != values.len() {
            return Err(Error::Checkpoint(format!(
                "model names {} parameters but exposes {}",
                values.len(),
                params.len()
            )));
        }
        for (param, data) in params.iter_mut().zip(values) {
            param.data_mut().assign(&data);
            param.zero_grad();
        }

        tracing::info!("Loaded model '{}' from {}", name, path.display());
        Ok(())
    }
}

impl<M, L> std::fmt::Debug for Fitter<M, L>
where
    M: LatentModel,
    L: Objective<M::Output>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fitter")
            .field("optimizer", &self.optimizer.name())
            .field("config", &self.config)
            .field("global_iter", &self.global_iter)
            .field("converged", &self.converged)
            .field("training", &self.training)
            .field("outcome", &self.outcome)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}
