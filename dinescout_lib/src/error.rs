//! Error types for the library layer.

use std::fmt;

use crate::browser::BrowserError;
use crate::config::ConfigError;
use crate::db::DbError;
use crate::records::RecordFileError;

/// Errors produced by the pipeline stages, wrapping the listing client,
/// browser, store, configuration and record-file errors.
#[derive(Debug)]
pub enum PipelineError {
    /// An error from the listing-site HTTP client.
    Api(dinescout_api::Error),
    /// A browser session could not be created or driven.
    Browser(BrowserError),
    /// The SQLite store failed; the current batch was rolled back.
    Db(DbError),
    /// Configuration could not be loaded or failed validation.
    Config(ConfigError),
    /// A CSV input or output file could not be read or written.
    RecordFile(RecordFileError),
    /// User-provided input failed validation.
    InvalidInput(String),
    /// A worker task panicked or was cancelled.
    Join(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(e) => write!(f, "API error: {}", e),
            Self::Browser(e) => write!(f, "Browser error: {}", e),
            Self::Db(e) => write!(f, "Database error: {}", e),
            Self::Config(e) => write!(f, "Config error: {}", e),
            Self::RecordFile(e) => write!(f, "Record file error: {}", e),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Self::Join(msg) => write!(f, "Worker failed: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Api(e) => Some(e),
            Self::Browser(e) => Some(e),
            Self::Db(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::RecordFile(e) => Some(e),
            _ => None,
        }
    }
}

impl From<dinescout_api::Error> for PipelineError {
    fn from(e: dinescout_api::Error) -> Self {
        Self::Api(e)
    }
}

impl From<BrowserError> for PipelineError {
    fn from(e: BrowserError) -> Self {
        Self::Browser(e)
    }
}

impl From<DbError> for PipelineError {
    fn from(e: DbError) -> Self {
        Self::Db(e)
    }
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<RecordFileError> for PipelineError {
    fn from(e: RecordFileError) -> Self {
        Self::RecordFile(e)
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Join(e.to_string())
    }
}
