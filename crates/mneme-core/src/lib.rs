pub mod chain;
pub mod clock;
pub mod commit_md;
pub mod error;
pub mod hash;
pub mod log_md;
pub mod main_md;
pub mod text;
pub mod types;

pub use chain::{fold_progress, ChainPolicy};
pub use error::{MemoryError, Result};
pub use types::*;
