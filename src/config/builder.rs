//! Build fitting components from configuration

use super::schema::OptimSpec;
use crate::error::{Error, Result};
use crate::optim::{Adam, Optimizer, SGD};

fn param_or(spec: &OptimSpec, key: &str, default: f32) -> f32 {
    spec.params
        .get(key)
        .and_then(|v| v.as_f64())
        .map_or(default, |v| v as f32)
}

/// Build optimizer from configuration
pub fn build_optimizer(spec: &OptimSpec) -> Result<Box<dyn Optimizer>> {
    match spec.name.to_lowercase().as_str() {
        "sgd" => Ok(Box::new(SGD::new(
            spec.lr,
            param_or(spec, "momentum", 0.0),
        ))),
        "adam" => Ok(Box::new(Adam::new(
            spec.lr,
            param_or(spec, "beta1", 0.9),
            param_or(spec, "beta2", 0.999),
            param_or(spec, "eps", 1e-8),
        ))),
        name => Err(Error::ConfigError(format!(
            "Unknown optimizer: {}. Supported: adam, sgd",
            name
        ))),
    }
}
