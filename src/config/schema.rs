//! Configuration schema types

use crate::io::{ArchitectureInfo, ModelFormat, SaveConfig};
use crate::train::FitConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Complete fitting specification loaded from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSpec {
    pub model: ModelSpec,

    pub data: DataSpec,

    pub optimizer: OptimSpec,

    #[serde(default)]
    pub training: TrainingParams,

    /// Where the fitted model is written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputSpec>,
}

impl FitSpec {
    /// Fitter settings described by this specification
    pub fn fit_config(&self) -> FitConfig {
        let training = &self.training;
        let config = FitConfig::new()
            .with_learning_rate(self.optimizer.lr)
            .with_batch_size(self.data.batch_size)
            .with_eval_prop(self.data.eval_prop)
            .with_max_epochs(training.max_epochs)
            .with_samples(training.mc_samples, training.iw_samples)
            .with_steps_anneal(training.steps_anneal)
            .with_log_interval(training.log_interval)
            .with_verbose(training.verbose);

        let config = match training.grad_clip {
            Some(max_norm) => config.with_grad_clip(max_norm),
            None => config,
        };
        match training.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }

    pub fn architecture(&self) -> ArchitectureInfo {
        ArchitectureInfo::new(
            self.model.input_dim,
            self.model.inference_model_dims.clone(),
            self.model.latent_dim,
        )
    }

    pub fn save_config(&self) -> SaveConfig {
        self.output
            .as_ref()
            .map(|out| SaveConfig::new(out.format))
            .unwrap_or_default()
    }
}

/// Layer sizes of the model being fitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Width of the one-hot encoded input
    pub input_dim: usize,

    /// Hidden layer sizes of the inference network
    #[serde(default)]
    pub inference_model_dims: Vec<usize>,

    pub latent_dim: usize,
}

/// Response data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSpec {
    /// CSV or JSON response table
    pub path: PathBuf,

    /// Number of response categories per item
    pub categories: Vec<usize>,

    /// Share of rows drawn into the evaluation set
    #[serde(default = "default_eval_prop")]
    pub eval_prop: f32,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Optimizer specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimSpec {
    /// Optimizer name (adam, sgd)
    pub name: String,

    pub lr: f32,

    /// Optimizer-specific parameters (beta1, beta2, eps, momentum)
    #[serde(flatten)]
    pub params: HashMap<String, serde_json::Value>,
}

/// Fitting loop parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    #[serde(default = "default_max_epochs")]
    pub max_epochs: usize,

    #[serde(default = "default_samples")]
    pub mc_samples: usize,

    #[serde(default = "default_samples")]
    pub iw_samples: usize,

    #[serde(default)]
    pub steps_anneal: usize,

    #[serde(default = "default_log_interval")]
    pub log_interval: usize,

    /// Maximum gradient norm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grad_clip: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default = "default_verbose")]
    pub verbose: bool,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            max_epochs: default_max_epochs(),
            mc_samples: default_samples(),
            iw_samples: default_samples(),
            steps_anneal: 0,
            log_interval: default_log_interval(),
            grad_clip: None,
            seed: None,
            verbose: default_verbose(),
        }
    }
}

/// Checkpoint output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default)]
    pub format: ModelFormat,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            name: default_model_name(),
            format: ModelFormat::default(),
        }
    }
}

fn default_eval_prop() -> f32 {
    0.9
}

fn default_batch_size() -> usize {
    32
}

fn default_max_epochs() -> usize {
    3000
}

fn default_samples() -> usize {
    1
}

fn default_log_interval() -> usize {
    100
}

fn default_verbose() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./checkpoints")
}

fn default_model_name() -> String {
    "model".to_string()
}
