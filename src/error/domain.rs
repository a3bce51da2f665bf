//! Domain-specific error types using `thiserror`.

use std::result::Result as StdResult;

use thiserror::Error;

use crate::config::settings::ConfigError;

/// Errors returned by collection session and configuration operations.
#[derive(Error, Debug)]
pub enum CollectionError {
    /// A dispatch session is already running on this collection.
    #[error("A handler session is already running")]
    SessionAlreadyRunning,
    /// Background tasks need a Tokio runtime and none is active.
    #[error("No Tokio runtime available: {reason}")]
    NoRuntime { reason: String },
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for collection operations.
pub type Result<T> = StdResult<T, CollectionError>;
