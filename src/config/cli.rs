//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! ajustar validate fit.yaml --detailed
//! ajustar inspect checkpoints/model.json --format yaml
//! ajustar prepare fit.yaml --eval-prop 0.5 --seed 42
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ajustar: fitting harness for latent-variable models
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "ajustar")]
#[command(version)]
#[command(about = "Fit, evaluate and checkpoint latent-variable models of response data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Validate a configuration file
    Validate(ValidateArgs),

    /// Show the metadata and parameters of a checkpoint
    Inspect(InspectArgs),

    /// Load and encode the configured data, reporting split sizes
    Prepare(PrepareArgs),
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Show detailed validation report
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for the inspect command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InspectArgs {
    /// Path to a JSON, YAML or SafeTensors checkpoint
    #[arg(value_name = "CHECKPOINT")]
    pub checkpoint: PathBuf,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the prepare command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct PrepareArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override the evaluation proportion
    #[arg(long)]
    pub eval_prop: Option<f32>,

    /// Override the split seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            _ => Err(format!(
                "Unknown output format: {}. Valid formats: text, json, yaml",
                s
            )),
        }
    }
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply command-line overrides to a FitSpec
pub fn apply_overrides(spec: &mut super::FitSpec, args: &PrepareArgs) {
    if let Some(eval_prop) = args.eval_prop {
        spec.data.eval_prop = eval_prop;
    }
    if let Some(seed) = args.seed {
        spec.training.seed = Some(seed);
    }
}
