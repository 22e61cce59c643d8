//! Exporters for query results.
//!
//! Each exporter serializes a [`TabularResult`] to a file, replacing any
//! existing file at the target path.

pub mod json;
pub mod xml;

use crate::core::{EtlError, Result, TabularResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Document format for exported results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Xml,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Xml => "xml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "xml" => Ok(OutputFormat::Xml),
            _ => Err(EtlError::Config(format!(
                "Unsupported export format: '{}'. Supported formats: json, xml",
                s
            ))),
        }
    }
}

/// Path of the `index`-th (1-based) query result inside `dir`.
pub fn output_path(dir: &Path, index: usize, format: OutputFormat) -> PathBuf {
    dir.join(format!("query{}_result.{}", index, format.extension()))
}

/// Writes `result` to `path` in the given format.
pub fn write(result: &TabularResult, format: OutputFormat, path: &Path) -> Result<()> {
    match format {
        OutputFormat::Json => json::write(result, path)?,
        OutputFormat::Xml => xml::write(result, path)?,
    }
    tracing::info!(path = %path.display(), rows = result.row_count(), "Query result saved");
    Ok(())
}
