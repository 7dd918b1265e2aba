//! Ajustar CLI
//!
//! # Usage
//!
//! ```bash
//! # Validate a fitting config
//! ajustar validate fit.yaml --detailed
//!
//! # Show what a checkpoint holds
//! ajustar inspect checkpoints/model.safetensors
//!
//! # Load and encode the configured data
//! ajustar prepare fit.yaml --eval-prop 0.5 --seed 42
//! ```

use ajustar::config::{
    apply_overrides, build_optimizer, load_config, prepare_data, validate_config, Cli, Command,
    InspectArgs, OutputFormat, PrepareArgs, ValidateArgs,
};
use ajustar::data::encoded_width;
use ajustar::io::{load_checkpoint, CheckpointMetadata, ParameterInfo};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        LogLevel::Quiet
    } else if cli.verbose {
        LogLevel::Verbose
    } else {
        LogLevel::Normal
    };
    init_tracing(log_level);

    let result = match cli.command {
        Command::Validate(args) => run_validate(args),
        Command::Inspect(args) => run_inspect(args),
        Command::Prepare(args) => run_prepare(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Quiet => "error",
            LogLevel::Normal => "info",
            LogLevel::Verbose => "debug",
        }
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the flag level
fn init_tracing(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Print `report` as JSON or YAML; returns false when text output is wanted
fn print_structured<T: Serialize>(report: &T, format: OutputFormat) -> Result<bool, String> {
    match format {
        OutputFormat::Text => return Ok(false),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(report)
                .map_err(|e| format!("YAML serialization error: {e}"))?;
            print!("{yaml}");
        }
    }
    Ok(true)
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    tracing::info!("Validating config: {}", args.config.display());

    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    build_optimizer(&spec.optimizer).map_err(|e| format!("Config error: {e}"))?;

    tracing::info!("Configuration is valid");

    if args.detailed {
        let config = spec.fit_config();
        println!("Model: {}", spec.architecture().describe());
        println!(
            "Data: {} ({} items, eval_prop={})",
            spec.data.path.display(),
            spec.data.categories.len(),
            spec.data.eval_prop
        );
        println!(
            "Optimizer: {} (lr={})",
            spec.optimizer.name, spec.optimizer.lr
        );
        println!("Batch size: {}", config.batch_size);
        println!("Max epochs: {}", config.max_epochs);
        println!(
            "Samples: mc={} iw={}",
            config.mc_samples, config.iw_samples
        );
        println!("Annealing steps: {}", config.steps_anneal);
        match config.max_grad_norm {
            Some(norm) => println!("Gradient clipping: {norm}"),
            None => println!("Gradient clipping: off"),
        }
        if let Some(output) = &spec.output {
            println!(
                "Output: {}/{}.{}",
                output.dir.display(),
                output.name,
                output.format.extension()
            );
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct InspectReport<'a> {
    metadata: &'a CheckpointMetadata,
    num_values: usize,
    parameters: Vec<ParameterInfo>,
}

fn run_inspect(args: InspectArgs) -> Result<(), String> {
    let checkpoint =
        load_checkpoint(&args.checkpoint).map_err(|e| format!("Checkpoint error: {e}"))?;
    let meta = &checkpoint.metadata;

    let report = InspectReport {
        metadata: meta,
        num_values: checkpoint.num_values(),
        parameters: checkpoint
            .parameters
            .iter()
            .map(|(name, tensor)| ParameterInfo {
                name: name.clone(),
                len: tensor.len(),
                requires_grad: tensor.requires_grad(),
            })
            .collect(),
    };
    if print_structured(&report, args.format)? {
        return Ok(());
    }

    println!("Checkpoint: {}", args.checkpoint.display());
    println!("Name: {}", meta.name);
    println!("Architecture: {}", meta.architecture.describe());
    println!("Iterations: {}", meta.global_iter);
    match meta.best_avg_loss {
        Some(loss) => println!("Best mean loss: {loss:.4}"),
        None => println!("Best mean loss: -"),
    }
    println!("Converged: {}", meta.converged);
    println!("Saved at: {}", meta.saved_at.to_rfc3339());
    for (key, value) in &meta.custom {
        println!("  {key}: {value}");
    }

    println!();
    println!("{:<32} {:>10} {:>6}", "Parameter", "Values", "Grad");
    for param in &report.parameters {
        println!(
            "{:<32} {:>10} {:>6}",
            param.name, param.len, param.requires_grad
        );
    }
    println!(
        "{} parameters, {} values",
        report.parameters.len(),
        report.num_values
    );

    Ok(())
}

#[derive(Serialize)]
struct PrepareReport {
    path: PathBuf,
    rows: usize,
    items: usize,
    missing: usize,
    encoded_width: usize,
    train_rows: usize,
    eval_rows: usize,
    batch_size: usize,
    train_batches: usize,
}

fn run_prepare(args: PrepareArgs) -> Result<(), String> {
    let mut spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    apply_overrides(&mut spec, &args);
    validate_config(&spec).map_err(|e| format!("Invalid override: {e}"))?;

    let prepared = prepare_data(&spec).map_err(|e| format!("Data error: {e}"))?;
    let batch_size = spec.data.batch_size;

    let report = PrepareReport {
        path: spec.data.path.clone(),
        rows: prepared.table.nrows(),
        items: prepared.table.ncols(),
        missing: prepared.table.missing_count(),
        encoded_width: encoded_width(&spec.data.categories),
        train_rows: prepared.train.len(),
        eval_rows: prepared.eval.len(),
        batch_size,
        train_batches: prepared.train.len().div_ceil(batch_size),
    };

    if print_structured(&report, args.format)? {
        return Ok(());
    }

    println!("Data: {}", report.path.display());
    println!(
        "Responses: {} rows x {} items ({} missing)",
        report.rows, report.items, report.missing
    );
    println!("Encoded width: {}", report.encoded_width);
    println!(
        "Train: {} rows ({} batches of {})",
        report.train_rows, report.train_batches, report.batch_size
    );
    println!(
        "Eval: {} rows (eval_prop={})",
        report.eval_rows, spec.data.eval_prop
    );

    Ok(())
}
