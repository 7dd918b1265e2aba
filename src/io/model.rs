//! Checkpoint structure for serialization

use crate::{Error, Result, Tensor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Layer sizes of the model that produced a checkpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureInfo {
    /// Encoded input width
    pub input_dim: usize,

    /// Hidden layer sizes of the inference network
    pub inference_model_dims: Vec<usize>,

    /// Latent vector dimension
    pub latent_dim: usize,
}

impl ArchitectureInfo {
    pub fn new(input_dim: usize, inference_model_dims: Vec<usize>, latent_dim: usize) -> Self {
        Self {
            input_dim,
            inference_model_dims,
            latent_dim,
        }
    }

    /// Compact `input-hidden...-latent` form, e.g. `10-64-32-2`
    pub fn describe(&self) -> String {
        std::iter::once(self.input_dim)
            .chain(self.inference_model_dims.iter().copied())
            .chain(std::iter::once(self.latent_dim))
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// Checkpoint metadata: identity, architecture and fitting bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub name: String,

    pub architecture: ArchitectureInfo,

    /// Fitting iterations completed when the checkpoint was taken
    #[serde(default)]
    pub global_iter: usize,

    #[serde(default)]
    pub best_avg_loss: Option<f32>,

    #[serde(default)]
    pub converged: bool,

    pub saved_at: DateTime<Utc>,

    /// Custom metadata fields
    #[serde(default)]
    pub custom: HashMap<String, serde_json::Value>,
}

impl CheckpointMetadata {
    pub fn new(name: impl Into<String>, architecture: ArchitectureInfo) -> Self {
        Self {
            name: name.into(),
            architecture,
            global_iter: 0,
            best_avg_loss: None,
            converged: false,
            saved_at: Utc::now(),
            custom: HashMap::new(),
        }
    }

    /// Record the fitting state the parameters were taken at
    pub fn with_progress(
        mut self,
        global_iter: usize,
        best_avg_loss: Option<f32>,
        converged: bool,
    ) -> Self {
        self.global_iter = global_iter;
        self.best_avg_loss = best_avg_loss;
        self.converged = converged;
        self
    }

    /// Add custom metadata field
    pub fn with_custom(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }
}

/// Information about a stored parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Parameter name (e.g., "encoder.0.weight")
    pub name: String,

    /// Number of elements
    pub len: usize,

    pub requires_grad: bool,
}

/// Serializable checkpoint state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointState {
    pub metadata: CheckpointMetadata,

    pub parameters: Vec<ParameterInfo>,

    /// Parameter values concatenated in `parameters` order
    pub data: Vec<f32>,
}

/// Named model parameters together with their metadata
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub metadata: CheckpointMetadata,

    pub parameters: Vec<(String, Tensor)>,
}

impl Checkpoint {
    pub fn new(metadata: CheckpointMetadata, parameters: Vec<(String, Tensor)>) -> Self {
        Self {
            metadata,
            parameters,
        }
    }

    pub fn get_parameter(&self, name: &str) -> Option<&Tensor> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    /// Total number of stored values
    pub fn num_values(&self) -> usize {
        self.parameters.iter().map(|(_, t)| t.len()).sum()
    }

    pub fn to_state(&self) -> CheckpointState {
        let mut data = Vec::with_capacity(self.num_values());
        let parameters = self
            .parameters
            .iter()
            .map(|(name, tensor)| {
                data.extend(tensor.data().iter().copied());
                ParameterInfo {
                    name: name.clone(),
                    len: tensor.len(),
                    requires_grad: tensor.requires_grad(),
                }
            })
            .collect();

        CheckpointState {
            metadata: self.metadata.clone(),
            parameters,
            data,
        }
    }

    /// Rebuild a checkpoint, rejecting states whose data does not cover the parameters
    pub fn from_state(state: CheckpointState) -> Result<Self> {
        let expected = state
            .parameters
            .iter()
            .try_fold(0usize, |acc, p| acc.checked_add(p.len))
            .ok_or_else(|| {
                Error::Checkpoint("parameter lengths overflow the addressable size".to_string())
            })?;
        if expected != state.data.len() {
            return Err(Error::Checkpoint(format!(
                "parameter table describes {} values but {} are stored",
                expected,
                state.data.len()
            )));
        }

        let mut offset = 0usize;
        let mut parameters = Vec::with_capacity(state.parameters.len());
        for info in state.parameters {
            let values = offset
                .checked_add(info.len)
                .and_then(|end| state.data.get(offset..end))
                .ok_or_else(|| {
                    Error::Checkpoint(format!("data runs short for parameter '{}'", info.name))
                })?;
            offset += info.len;
            parameters.push((info.name, Tensor::from_vec(values.to_vec(), info.requires_grad)));
        }

        Ok(Self {
            metadata: state.metadata,
            parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint() -> Checkpoint {
        let params = vec![
            ("encoder.weight".to_string(), Tensor::from_vec(vec![1.0, 2.0, 3.0], true)),
            ("encoder.bias".to_string(), Tensor::from_vec(vec![0.1], true)),
        ];
        Checkpoint::new(
            CheckpointMetadata::new("irt", ArchitectureInfo::new(6, vec![4], 2)),
            params,
        )
    }

    #[test]
    fn test_architecture_describe() {
        let arch = ArchitectureInfo::new(10, vec![64, 32], 2);
        assert_eq!(arch.describe(), "10-64-32-2");
        assert_eq!(ArchitectureInfo::new(3, vec![], 1).describe(), "3-1");
    }

    #[test]
    fn test_metadata_progress() {
        let meta = CheckpointMetadata::new("m", ArchitectureInfo::default())
            .with_progress(250, Some(1.5), true)
            .with_custom("dataset", serde_json::json!("ipip"));

        assert_eq!(meta.global_iter, 250);
        assert_eq!(meta.best_avg_loss, Some(1.5));
        assert!(meta.converged);
        assert_eq!(meta.custom.len(), 1);
    }

    #[test]
    fn test_state_round_trip() {
        let original = checkpoint();
        let state = original.to_state();
        assert_eq!(state.data, vec![1.0, 2.0, 3.0, 0.1]);

        let restored = Checkpoint::from_state(state).unwrap();
        assert_eq!(restored.num_values(), 4);
        assert_eq!(
            restored.get_parameter("encoder.weight").unwrap().data(),
            original.get_parameter("encoder.weight").unwrap().data()
        );
        assert!(restored.get_parameter("decoder.weight").is_none());
    }

    #[test]
    fn test_truncated_state_rejected() {
        let mut state = checkpoint().to_state();
        state.data.pop();
        assert!(matches!(
            Checkpoint::from_state(state),
            Err(Error::Checkpoint(_))
        ));
    }
}
