// Core infrastructure modules
pub mod core;

// Pipeline stages
pub mod config;
pub mod export;
pub mod input;
pub mod pipeline;
pub mod progress;

pub use crate::core::{EtlError, Result, TabularResult, Value};
pub use pipeline::{Pipeline, PipelineOptions, RunReport};
