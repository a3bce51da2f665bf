//! Errbox - In-process error aggregation
//!
//! A collection buffers errors reported from anywhere in an application and
//! hands them, in arrival order, to registered handlers running on background
//! Tokio tasks. Producers never block on handlers and never see a panic from
//! the collection.

pub mod buffer;
pub mod collection;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;

// Re-export key types for convenience
pub use {
    buffer::{ErrorBuffer, ErrorEntry},
    collection::{ErrorCollection, SessionState},
    config::{CollectionConfig, ConfigError},
    error::{CollectionError, ResultExt},
    handlers::{
        ErrorHandler, LogSink, Logger, MemorySink, PanicRecover, Severity, SharedHandler,
        TracingSink, shared,
    },
    logging::{LoggingError, init_logging},
};
