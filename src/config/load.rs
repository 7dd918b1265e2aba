//! Loading configuration files and the data they point to

use super::schema::FitSpec;
use super::validate::validate_config;
use crate::data::{ResponseDataset, ResponseTable, Split};
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;

/// Load a fitting spec from a YAML file and validate it
///
/// # Example
///
/// ```no_run
/// use ajustar::config::load_config;
///
/// let spec = load_config("fit.yaml")?;
/// println!("{} items", spec.data.categories.len());
/// # Ok::<(), ajustar::Error>(())
/// ```
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<FitSpec> {
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {}",
            config_path.as_ref().display(),
            e
        ))
    })?;

    let spec: FitSpec = serde_yaml::from_str(&yaml_content)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {}", e)))?;

    validate_config(&spec).map_err(|e| Error::ConfigError(format!("Invalid config: {}", e)))?;

    Ok(spec)
}

/// Encoded training and evaluation sets for a spec
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub table: ResponseTable,
    pub train: ResponseDataset,
    pub eval: ResponseDataset,
}

/// Load the configured response table and encode both splits
///
/// Uses the same split rule as [`Fitter::run_training`](crate::train::Fitter::run_training):
/// every row for training and a random `eval_prop` share for evaluation.
pub fn prepare_data(spec: &FitSpec) -> Result<PreparedData> {
    let table = ResponseTable::load(&spec.data.path)?;
    prepare_table(spec, table)
}

pub(crate) fn prepare_table(spec: &FitSpec, table: ResponseTable) -> Result<PreparedData> {
    let mut rng = match spec.training.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let categories = &spec.data.categories;

    let train = ResponseDataset::new(&table, categories, Split::Full, &mut rng)?;
    let eval = ResponseDataset::new(
        &table,
        categories,
        Split::Holdout {
            proportion: spec.data.eval_prop,
        },
        &mut rng,
    )?;

    if train.width() != spec.model.input_dim {
        return Err(Error::ShapeMismatch {
            expected: vec![spec.model.input_dim],
            got: vec![train.width()],
        });
    }

    Ok(PreparedData { table, train, eval })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID: &str = r#"
model:
  input_dim: 5
  inference_model_dims: [8]
  latent_dim: 1

data:
  path: responses.csv
  categories: [2, 3]
  batch_size: 8

optimizer:
  name: adam
  lr: 0.001
"#;

    fn write_yaml(yaml: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_load_valid_config() {
        let temp_file = write_yaml(VALID);

        let spec = load_config(temp_file.path()).unwrap();
        assert_eq!(spec.optimizer.name, "adam");
        assert_eq!(spec.data.batch_size, 8);
        assert_eq!(spec.training.max_epochs, 3000);
    }

    #[test]
    fn test_load_invalid_config() {
        let temp_file = write_yaml(&VALID.replace("batch_size: 8", "batch_size: 0"));

        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid batch size"));
    }

    #[test]
    fn test_load_malformed_yaml() {
        let temp_file = write_yaml("this is not valid yaml: [}");
        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config("/nonexistent/fit.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_prepare_table_sizes() {
        let mut spec: FitSpec = serde_yaml::from_str(VALID).unwrap();
        spec.data.eval_prop = 0.5;
        spec.training.seed = Some(7);

        let table = ResponseTable::from_rows(vec![
            vec![0.0, 2.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            vec![1.0, 2.0],
            vec![0.0, 1.0],
        ])
        .unwrap();

        let prepared = prepare_table(&spec, table).unwrap();
        assert_eq!(prepared.train.len(), 5);
        assert_eq!(prepared.eval.len(), 3);
        assert_eq!(prepared.train.width(), 5);
    }

    #[test]
    fn test_prepare_table_width_mismatch() {
        let mut spec: FitSpec = serde_yaml::from_str(VALID).unwrap();
        spec.model.input_dim = 6;

        let table = ResponseTable::from_rows(vec![vec![0.0, 2.0]]).unwrap();
        let err = prepare_table(&spec, table).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }
}
