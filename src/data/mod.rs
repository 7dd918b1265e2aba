//! Response data: tables, one-hot encoding, splits and mini-batch loading

mod encode;
mod loader;
mod split;
mod table;

pub use encode::{encode_one_hot, encoded_width};
pub use loader::{Batch, DataLoader, ResponseDataset};
pub use split::Split;
pub use table::ResponseTable;
