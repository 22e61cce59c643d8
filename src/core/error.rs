/// Roomstat Error Module
///
/// This module defines the error types shared by every stage of a run:
/// configuration, connecting, reading input files, executing SQL and
/// writing exported documents.
use std::fmt;
use thiserror::Error;

/// Error type for the roomstat pipeline.
///
/// Driver errors from either database backend are folded into `Query`,
/// serializer failures while exporting are folded into `Export`.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Missing or invalid connection settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// The database could not be reached or refused the login
    #[error("Connection error: {0}")]
    Connection(String),

    /// An input JSON file is missing or cannot be parsed
    #[error("Failed to read {path}: {reason}")]
    FileRead { path: String, reason: String },

    /// SQL execution or fetch failures, including constraint violations
    #[error("Query error: {0}")]
    Query(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document serialization failures while exporting
    #[error("Export error: {0}")]
    Export(String),
}

/// Coarse classification of an [`EtlError`], stable for callers that only
/// care about which stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Connection,
    FileRead,
    Query,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "ConfigError",
            ErrorKind::Connection => "ConnectionError",
            ErrorKind::FileRead => "FileReadError",
            ErrorKind::Query => "QueryError",
            ErrorKind::Io => "IOError",
        };
        f.write_str(name)
    }
}

impl EtlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EtlError::Config(_) => ErrorKind::Config,
            EtlError::Connection(_) => ErrorKind::Connection,
            EtlError::FileRead { .. } => ErrorKind::FileRead,
            EtlError::Query(_) => ErrorKind::Query,
            EtlError::Io(_) | EtlError::Export(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn file_read(path: impl AsRef<std::path::Path>, reason: impl fmt::Display) -> Self {
        EtlError::FileRead {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<rusqlite::Error> for EtlError {
    fn from(e: rusqlite::Error) -> Self {
        EtlError::Query(e.to_string())
    }
}

impl From<postgres::Error> for EtlError {
    fn from(e: postgres::Error) -> Self {
        EtlError::Query(e.to_string())
    }
}

impl From<quick_xml::Error> for EtlError {
    fn from(e: quick_xml::Error) -> Self {
        match e {
            quick_xml::Error::Io(io) => EtlError::Io(std::io::Error::new(io.kind(), io.to_string())),
            other => EtlError::Export(other.to_string()),
        }
    }
}

/// Type alias for Result to use EtlError as the error type.
pub type Result<T> = std::result::Result<T, EtlError>;
