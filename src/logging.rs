//! Subscriber setup for applications that embed a collection.
//!
//! The built-in [`TracingSink`](crate::handlers::TracingSink) only emits
//! `tracing` events; an application decides where they go. This helper
//! installs a formatting subscriber filtered by `RUST_LOG`.

use {
    thiserror::Error,
    tracing_subscriber::{
        EnvFilter,
        filter::ParseError,
        fmt,
        util::{SubscriberInitExt, TryInitError},
    },
};

/// Error type for logging setup.
#[derive(Error, Debug)]
pub enum LoggingError {
    /// The default filter directive could not be parsed.
    #[error("Invalid log filter: {0}")]
    InvalidFilter(#[from] ParseError),
    /// A global subscriber is already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Installs a global formatting subscriber.
///
/// # Arguments
///
/// * `default_filter` - Filter used when `RUST_LOG` is unset, e.g. `"errbox=debug"`.
///
/// # Errors
///
/// Returns `LoggingError` if the filter is invalid or a subscriber is already set.
pub fn init_logging(default_filter: &str) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)?,
    };
    fmt().with_env_filter(filter).finish().try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::logging::{LoggingError, init_logging};

    #[test]
    fn test_second_init_fails() {
        // Whichever test installs the subscriber first, the second call must fail
        let _ = init_logging("errbox=debug");
        assert!(matches!(
            init_logging("errbox=debug"),
            Err(LoggingError::AlreadyInitialized(_))
        ));
    }
}
