/// Core Module for roomstat
///
/// Shared infrastructure used by the pipeline and the exporters: the error
/// type, the dynamically typed query values and the database gateways.

pub mod db;
pub mod error;
pub mod value;

// Re-export commonly used types for convenience
pub use error::{ErrorKind, EtlError, Result};
pub use value::{TabularResult, Value};
