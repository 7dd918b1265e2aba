//! Configuration validation

use super::schema::FitSpec;

/// Validation error type
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Data path does not exist: {0}")]
    DataPathNotFound(String),

    #[error("Invalid {field}: {value} (must be > 0)")]
    InvalidDimension { field: &'static str, value: usize },

    #[error("Invalid batch size: {0} (must be > 0)")]
    InvalidBatchSize(usize),

    #[error("Invalid learning rate: {0} (must be > 0.0)")]
    InvalidLearningRate(f32),

    #[error("Invalid epochs: {0} (must be > 0)")]
    InvalidEpochs(usize),

    #[error("Invalid {field}: {value} (must be > 0)")]
    InvalidSampleCount { field: &'static str, value: usize },

    #[error("Invalid log interval: {0} (must be > 0)")]
    InvalidLogInterval(usize),

    #[error("Invalid gradient clip value: {0} (must be > 0.0)")]
    InvalidGradClip(f32),

    #[error("Invalid eval proportion: {0} (must be in (0, 1])")]
    InvalidEvalProp(f32),

    #[error("Invalid optimizer: {0} (must be one of: adam, sgd)")]
    InvalidOptimizer(String),

    #[error("Categories sum to {sum} but input_dim is {input_dim}")]
    CategoryMismatch { sum: usize, input_dim: usize },

    #[error("Item {item} has {count} categories (must be >= 2)")]
    InvalidCategoryCount { item: usize, count: usize },
}

/// Validate a fitting specification
///
/// Checks:
/// - The data path exists
/// - Sizes, counts and rates are positive
/// - The categories add up to the model input width
/// - The optimizer is supported
pub fn validate_config(spec: &FitSpec) -> Result<(), ValidationError> {
    // Skip in tests where files may not exist
    #[cfg(not(test))]
    if !spec.data.path.exists() {
        return Err(ValidationError::DataPathNotFound(
            spec.data.path.display().to_string(),
        ));
    }

    let model = &spec.model;
    if model.input_dim == 0 {
        return Err(ValidationError::InvalidDimension {
            field: "input_dim",
            value: 0,
        });
    }
    if model.latent_dim == 0 {
        return Err(ValidationError::InvalidDimension {
            field: "latent_dim",
            value: 0,
        });
    }
    if model.inference_model_dims.contains(&0) {
        return Err(ValidationError::InvalidDimension {
            field: "inference_model_dims",
            value: 0,
        });
    }

    if spec.data.batch_size == 0 {
        return Err(ValidationError::InvalidBatchSize(spec.data.batch_size));
    }

    let eval_prop = spec.data.eval_prop;
    if !(eval_prop > 0.0 && eval_prop <= 1.0) {
        return Err(ValidationError::InvalidEvalProp(eval_prop));
    }

    if let Some(item) = spec.data.categories.iter().position(|&k| k < 2) {
        return Err(ValidationError::InvalidCategoryCount {
            item,
            count: spec.data.categories[item],
        });
    }
    let sum: usize = spec.data.categories.iter().sum();
    if sum != model.input_dim {
        return Err(ValidationError::CategoryMismatch {
            sum,
            input_dim: model.input_dim,
        });
    }

    if !(spec.optimizer.lr > 0.0) {
        return Err(ValidationError::InvalidLearningRate(spec.optimizer.lr));
    }

    match spec.optimizer.name.to_lowercase().as_str() {
        "adam" | "sgd" => {}
        _ => return Err(ValidationError::InvalidOptimizer(spec.optimizer.name.clone())),
    }

    let training = &spec.training;
    if training.max_epochs == 0 {
        return Err(ValidationError::InvalidEpochs(training.max_epochs));
    }
    if training.mc_samples == 0 {
        return Err(ValidationError::InvalidSampleCount {
            field: "mc_samples",
            value: 0,
        });
    }
    if training.iw_samples == 0 {
        return Err(ValidationError::InvalidSampleCount {
            field: "iw_samples",
            value: 0,
        });
    }
    if training.log_interval == 0 {
        return Err(ValidationError::InvalidLogInterval(training.log_interval));
    }

    if let Some(clip) = training.grad_clip {
        if !(clip > 0.0) {
            return Err(ValidationError::InvalidGradClip(clip));
        }
    }

    Ok(())
}
