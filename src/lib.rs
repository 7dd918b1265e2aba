//! # Ajustar: fitting harness for latent-variable models
//!
//! Ajustar drives a variational model of categorical response data through
//! mini-batch optimisation until a rolling-window convergence rule fires,
//! and saves and restores the fitted parameters.
//!
//! ## Architecture
//!
//! - **autograd**: Reverse-mode automatic differentiation over `ndarray` vectors
//! - **optim**: Optimizers (SGD, Adam) and gradient clipping
//! - **data**: Response tables, one-hot encoding, splits and batching
//! - **train**: The fitting loop, convergence detection, annealing and callbacks
//! - **io**: Checkpoint saving and loading (JSON, YAML, SafeTensors)
//! - **config**: Declarative YAML configuration and the CLI

pub mod autograd;
pub mod config;
pub mod data;
pub mod io;
pub mod optim;
pub mod train;

pub mod error;

// Re-export commonly used types
pub use autograd::{backward, Tensor};
pub use error::{Error, Result};
