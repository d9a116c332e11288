//! Database module for SQLite persistence.

mod pool;
mod registry;

pub use pool::*;
pub use registry::*;
