//! Tunable settings for error collections.
//!
//! Settings are plain serializable values so they can live in an
//! application's own configuration file.

pub mod settings;

pub use settings::{
    CollectionConfig, ConfigError, DEFAULT_CAPACITY_HINT, DEFAULT_CLEAR_CAPACITY_HINT,
};
