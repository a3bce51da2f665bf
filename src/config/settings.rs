//! Collection settings with JSON loading and validation.

use std::{fs::read_to_string, io::Error as StdError, path::Path};

use {
    serde::{Deserialize, Serialize},
    serde_json::{Error as SerdeJsonError, from_str},
    thiserror::Error,
    tracing::debug,
};

/// Initial buffer allocation for a new collection.
pub const DEFAULT_CAPACITY_HINT: usize = 200;

/// Buffer allocation used when a collection is cleared.
pub const DEFAULT_CLEAR_CAPACITY_HINT: usize = 500;

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("IO error: {0}")]
    IoError(#[from] StdError),
    /// Failed to deserialize the configuration.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerdeJsonError),
    /// A value is outside its allowed range.
    #[error("Invalid configuration value: {reason}")]
    InvalidValue { reason: String },
}

/// Settings applied when a collection is created.
///
/// Missing fields take their defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Initial buffer allocation. The buffer grows past it.
    pub capacity_hint: usize,
    /// Buffer allocation after `clear`.
    pub clear_capacity_hint: usize,
    /// Slots in the delivery conduit between dispatch and handlers.
    pub delivery_capacity: usize,
    /// Slots in each non-consuming monitor conduit.
    pub monitor_capacity: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            capacity_hint: DEFAULT_CAPACITY_HINT,
            clear_capacity_hint: DEFAULT_CLEAR_CAPACITY_HINT,
            delivery_capacity: 1,
            monitor_capacity: 1,
        }
    }
}

impl CollectionConfig {
    /// Creates default settings with a custom initial capacity.
    #[must_use]
    pub fn with_capacity_hint(capacity_hint: usize) -> Self {
        Self {
            capacity_hint,
            ..Self::default()
        }
    }

    /// Parses and validates settings from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the document is malformed or a value is invalid.
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading collection settings from {:?}", path);
        let contents = read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a zero-sized conduit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delivery_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                reason: "delivery_capacity must be at least 1".to_string(),
            });
        }
        if self.monitor_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                reason: "monitor_capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{fs::write, io::ErrorKind::NotFound};

    use tempfile::tempdir;

    use crate::config::settings::{CollectionConfig, ConfigError};

    #[test]
    fn test_collection_config_default() {
        let config = CollectionConfig::default();
        assert_eq!(config.capacity_hint, 200);
        assert_eq!(config.clear_capacity_hint, 500);
        assert_eq!(config.delivery_capacity, 1);
        assert_eq!(config.monitor_capacity, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = CollectionConfig::from_json_str(r#"{ "capacity_hint": 16 }"#).unwrap();
        assert_eq!(config, CollectionConfig::with_capacity_hint(16));
    }

    #[test]
    fn test_zero_delivery_capacity_rejected() {
        let result = CollectionConfig::from_json_str(r#"{ "delivery_capacity": 0 }"#);
        match result {
            Err(ConfigError::InvalidValue { reason }) => {
                assert_eq!(reason, "delivery_capacity must be at least 1");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_json_rejected() {
        let result = CollectionConfig::from_json_str("{ capacity_hint: }");
        assert!(matches!(result, Err(ConfigError::SerializationError(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("errbox.json");
        write(&path, r#"{ "capacity_hint": 32, "monitor_capacity": 4 }"#).unwrap();

        let config = CollectionConfig::load(&path).unwrap();
        assert_eq!(config.capacity_hint, 32);
        assert_eq!(config.monitor_capacity, 4);
        assert_eq!(config.clear_capacity_hint, 500);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        match CollectionConfig::load(dir.path().join("absent.json")) {
            Err(ConfigError::IoError(e)) => assert_eq!(e.kind(), NotFound),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
