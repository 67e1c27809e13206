//! General-purpose utility modules.

pub mod crc32;
pub mod error;
pub mod log;
pub mod write_ext;

// Re-export commonly used items
pub use error::{Ffv1Error, Result};
