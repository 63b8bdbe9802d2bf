// Domain errors - Error types for the domain layer

use thiserror::Error;

/// Domain-specific error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    /// Invalid arguments provided
    #[error("Bad arguments: {0}")]
    BadArgs(String),
    /// Frame buffer does not match its declared dimensions
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
    /// Tracker parameters out of range
    #[error("Invalid tracker settings: {0}")]
    InvalidSettings(String),
    /// Channel state change not allowed from the current state
    #[error("Invalid channel transition: {0}")]
    InvalidTransition(String),
}
