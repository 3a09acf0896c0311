use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the flow analyzer.
#[derive(Error, Debug)]
pub enum FlowError {
    /// A log file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source directory does not exist or is not a directory.
    #[error("Source directory not found: {0}")]
    SourceDirNotFound(PathBuf),

    /// The source directory exists but could not be listed.
    #[error("Failed to list source directory {path}: {source}")]
    SourceDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The report could not be persisted.
    #[error("Failed to write report {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The report could not be serialized.
    #[error("Failed to serialize JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// A scan worker died before delivering its result.
    #[error("Worker failed: {0}")]
    Worker(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the flow crates.
pub type Result<T> = std::result::Result<T, FlowError>;
