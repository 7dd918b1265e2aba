//! Checkpoint I/O
//!
//! Saves and loads named model parameters with their fitting metadata in
//! JSON, YAML or SafeTensors files.

mod format;
mod load;
mod model;
mod save;


pub use format::{ModelFormat, SaveConfig};
pub use load::load_checkpoint;
pub use model::{ArchitectureInfo, Checkpoint, CheckpointMetadata, CheckpointState, ParameterInfo};
pub use save::save_checkpoint;
