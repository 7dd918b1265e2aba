//! Checkpoint loading

use super::format::ModelFormat;
use super::model::{ArchitectureInfo, Checkpoint, CheckpointMetadata, CheckpointState};
use crate::{Error, Result, Tensor};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;

/// Load a checkpoint, detecting the format from the file extension
///
/// # Example
///
/// ```no_run
/// use ajustar::io::load_checkpoint;
///
/// let checkpoint = load_checkpoint("irt-2d.json").unwrap();
/// println!("{} at iteration {}", checkpoint.metadata.name, checkpoint.metadata.global_iter);
/// ```
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Checkpoint> {
    let path = path.as_ref();

    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Serialization("File has no extension".to_string()))?;
    let format = ModelFormat::from_extension(ext)
        .ok_or_else(|| Error::Serialization(format!("Unsupported file extension: {ext}")))?;

    let checkpoint = match format {
        ModelFormat::SafeTensors => load_safetensors(&std::fs::read(path)?)?,
        ModelFormat::Json => {
            let content = std::fs::read_to_string(path)?;
            let state: CheckpointState = serde_json::from_str(&content)
                .map_err(|e| Error::Serialization(format!("JSON deserialization failed: {e}")))?;
            Checkpoint::from_state(state)?
        }
        ModelFormat::Yaml => {
            let content = std::fs::read_to_string(path)?;
            let state: CheckpointState = serde_yaml::from_str(&content)
                .map_err(|e| Error::Serialization(format!("YAML deserialization failed: {e}")))?;
            Checkpoint::from_state(state)?
        }
    };

    tracing::debug!(
        "Loaded checkpoint '{}' ({} parameters) from {}",
        checkpoint.metadata.name,
        checkpoint.parameters.len(),
        path.display()
    );
    Ok(checkpoint)
}

fn load_safetensors(bytes: &[u8]) -> Result<Checkpoint> {
    let (_, header) = safetensors::SafeTensors::read_metadata(bytes)
        .map_err(|e| Error::Serialization(format!("SafeTensors parsing failed: {e}")))?;
    let empty = HashMap::new();
    let meta = header.metadata().as_ref().unwrap_or(&empty);

    let metadata = CheckpointMetadata {
        name: meta
            .get("name")
            .cloned()
            .unwrap_or_else(|| "unknown".to_string()),
        architecture: header_value::<ArchitectureInfo>(meta, "architecture")?.unwrap_or_default(),
        global_iter: header_value(meta, "global_iter")?.unwrap_or(0),
        best_avg_loss: header_value::<Option<f32>>(meta, "best_avg_loss")?.flatten(),
        converged: header_value(meta, "converged")?.unwrap_or(false),
        saved_at: meta
            .get("saved_at")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default(),
        custom: header_value(meta, "custom")?.unwrap_or_default(),
    };

    let tensors = safetensors::SafeTensors::deserialize(bytes)
        .map_err(|e| Error::Serialization(format!("SafeTensors parsing failed: {e}")))?;

    let mut parameters = tensors
        .tensors()
        .into_iter()
        .map(|(name, view)| {
            if view.dtype() != safetensors::Dtype::F32 {
                return Err(Error::Checkpoint(format!(
                    "tensor '{name}' has dtype {:?}, expected F32",
                    view.dtype()
                )));
            }
            let values: Vec<f32> = view
                .data()
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            Ok((name, Tensor::from_vec(values, true)))
        })
        .collect::<Result<Vec<_>>>()?;
    parameters.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(Checkpoint::new(metadata, parameters))
}

/// Parse a JSON-encoded header entry, `None` when the key is absent
fn header_value<T: DeserializeOwned>(meta: &HashMap<String, String>, key: &str) -> Result<Option<T>> {
    meta.get(key)
        .map(|raw| {
            serde_json::from_str(raw)
                .map_err(|e| Error::Checkpoint(format!("invalid '{key}' in header: {e}")))
        })
        .transpose()
}
