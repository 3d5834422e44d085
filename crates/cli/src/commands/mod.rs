//! Command implementations. Output goes to the writer passed in.

use std::path::PathBuf;

use thiserror::Error;

pub mod carriers;
pub mod rules;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input file is not a provider config or rule map.
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}
