//! Tool errors.

use thiserror::Error;

use cnc_core::error::GameError;

/// Errors reported by the tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Error from the simulation core.
    #[error(transparent)]
    Core(#[from] GameError),

    /// IO error while reading or writing a file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data files failed validation.
    #[error("{count} problem(s) found in data files")]
    Invalid {
        /// Number of problems.
        count: usize,
    },

    /// No track with the requested number.
    #[error("No track control entry {0}")]
    NoSuchTrack(usize),
}

/// Result type for tool operations.
pub type Result<T> = std::result::Result<T, ToolError>;
