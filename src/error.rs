//! Error types for Director
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Director
#[derive(Debug, Error)]
pub enum DirectorError {
    /// Configuration rejected before any shift work started
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Outcome collection could not complete for a shift
    #[error("Scheduling fault: {0}")]
    Scheduling(String),

    /// A task implementation failed while executing
    #[error("Task error: {0}")]
    Task(String),
}

/// Result type alias for Director operations
pub type Result<T> = std::result::Result<T, DirectorError>;
