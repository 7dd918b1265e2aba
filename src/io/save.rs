//! Checkpoint saving

use super::format::{ModelFormat, SaveConfig};
use super::model::Checkpoint;
use crate::{Error, Result};
use safetensors::tensor::{Dtype, TensorView};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Save a checkpoint to a file in the configured format
///
/// # Example
///
/// ```no_run
/// use ajustar::io::{save_checkpoint, ArchitectureInfo, Checkpoint, CheckpointMetadata, SaveConfig};
/// use ajustar::Tensor;
///
/// let params = vec![("encoder.weight".to_string(), Tensor::from_vec(vec![1.0, 2.0], true))];
/// let meta = CheckpointMetadata::new("irt-2d", ArchitectureInfo::new(2, vec![], 1));
/// let checkpoint = Checkpoint::new(meta, params);
///
/// save_checkpoint(&checkpoint, "irt-2d.json", &SaveConfig::default()).unwrap();
/// ```
pub fn save_checkpoint(
    checkpoint: &Checkpoint,
    path: impl AsRef<Path>,
    config: &SaveConfig,
) -> Result<()> {
    let path = path.as_ref();

    let data = match config.format {
        ModelFormat::SafeTensors => save_safetensors(checkpoint)?,
        ModelFormat::Json => {
            let state = checkpoint.to_state();
            let text = if config.pretty {
                serde_json::to_string_pretty(&state)
            } else {
                serde_json::to_string(&state)
            }
            .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?;
            text.into_bytes()
        }
        ModelFormat::Yaml => serde_yaml::to_string(&checkpoint.to_state())
            .map_err(|e| Error::Serialization(format!("YAML serialization failed: {e}")))?
            .into_bytes(),
    };

    let mut file = File::create(path)?;
    file.write_all(&data)?;

    tracing::debug!(
        "Saved checkpoint '{}' ({} parameters) to {}",
        checkpoint.metadata.name,
        checkpoint.parameters.len(),
        path.display()
    );
    Ok(())
}

/// Encode parameters as f32 SafeTensors; metadata travels in the header
fn save_safetensors(checkpoint: &Checkpoint) -> Result<Vec<u8>> {
    let tensor_data: Vec<(String, Vec<u8>, Vec<usize>)> = checkpoint
        .parameters
        .iter()
        .map(|(name, tensor)| {
            let bytes: Vec<u8> = tensor.data().iter().flat_map(|v| v.to_le_bytes()).collect();
            (name.clone(), bytes, vec![tensor.len()])
        })
        .collect();

    let views = tensor_data
        .iter()
        .map(|(name, bytes, shape)| {
            TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map(|view| (name.as_str(), view))
                .map_err(|e| Error::Serialization(format!("invalid tensor '{name}': {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let meta = &checkpoint.metadata;
    let mut header = HashMap::new();
    header.insert("name".to_string(), meta.name.clone());
    header.insert("architecture".to_string(), header_json(&meta.architecture)?);
    header.insert("global_iter".to_string(), meta.global_iter.to_string());
    header.insert("best_avg_loss".to_string(), header_json(&meta.best_avg_loss)?);
    header.insert("converged".to_string(), meta.converged.to_string());
    header.insert("saved_at".to_string(), meta.saved_at.to_rfc3339());
    header.insert("custom".to_string(), header_json(&meta.custom)?);

    safetensors::serialize(views, &Some(header))
        .map_err(|e| Error::Serialization(format!("SafeTensors serialization failed: {e}")))
}

fn header_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Serialization(format!("metadata serialization failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{ArchitectureInfo, CheckpointMetadata};
    use crate::Tensor;
    use tempfile::NamedTempFile;

    fn checkpoint(name: &str) -> Checkpoint {
        let params = vec![
            ("encoder.weight".to_string(), Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], true)),
            ("encoder.bias".to_string(), Tensor::from_vec(vec![0.5], true)),
        ];
        Checkpoint::new(
            CheckpointMetadata::new(name, ArchitectureInfo::new(4, vec![2], 1)),
            params,
        )
    }

    #[test]
    fn test_save_json_contains_metadata() {
        let file = NamedTempFile::new().unwrap();
        save_checkpoint(&checkpoint("json-test"), file.path(), &SaveConfig::default()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.contains("json-test"));
        assert!(content.contains("inference_model_dims"));
        assert!(content.contains("saved_at"));
    }

    #[test]
    fn test_save_json_compact_is_single_line() {
        let file = NamedTempFile::new().unwrap();
        let config = SaveConfig::new(ModelFormat::Json).with_pretty(false);
        save_checkpoint(&checkpoint("compact"), file.path(), &config).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_save_yaml() {
        let file = NamedTempFile::new().unwrap();
        let config = SaveConfig::new(ModelFormat::Yaml);
        save_checkpoint(&checkpoint("yaml-test"), file.path(), &config).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.contains("encoder.weight"));
    }

    #[test]
    fn test_save_safetensors_readable() {
        let file = NamedTempFile::new().unwrap();
        let config = SaveConfig::new(ModelFormat::SafeTensors);
        save_checkpoint(&checkpoint("st"), file.path(), &config).unwrap();

        let bytes = std::fs::read(file.path()).unwrap();
        let loaded = safetensors::SafeTensors::deserialize(&bytes).unwrap();
        let weight = loaded.tensor("encoder.weight").unwrap();
        assert_eq!(weight.shape(), &[4]);

        let values: Vec<f32> = weight
            .data()
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);

        let (_, header) = safetensors::SafeTensors::read_metadata(&bytes).unwrap();
        let meta = header.metadata().as_ref().unwrap();
        assert_eq!(meta.get("name").unwrap(), "st");
        assert_eq!(meta.get("global_iter").unwrap(), "0");
    }

    #[test]
    fn test_save_invalid_path() {
        let result = save_checkpoint(
            &checkpoint("x"),
            "/nonexistent/directory/model.json",
            &SaveConfig::default(),
        );
        assert!(result.is_err());
    }
}
