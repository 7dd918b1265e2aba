//! Declarative YAML configuration
//!
//! # Example
//!
//! ```yaml
//! model:
//!   input_dim: 15
//!   inference_model_dims: [32]
//!   latent_dim: 2
//!
//! data:
//!   path: responses.csv
//!   categories: [3, 3, 3, 3, 3]
//!   batch_size: 32
//!
//! optimizer:
//!   name: adam
//!   lr: 1e-3
//!
//! training:
//!   max_epochs: 500
//!   steps_anneal: 1000
//!   seed: 42
//! ```

mod builder;
mod cli;
mod load;
mod schema;
mod validate;


pub use builder::build_optimizer;
pub use cli::{
    apply_overrides, parse_args, Cli, Command, InspectArgs, OutputFormat, PrepareArgs,
    ValidateArgs,
};
pub use load::{load_config, prepare_data, PreparedData};
pub use schema::{DataSpec, FitSpec, ModelSpec, OptimSpec, OutputSpec, TrainingParams};
pub use validate::{validate_config, ValidationError};
