// rust/data-core/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {

    #[error("Storage error at '{path}': {message}")]
    Storage {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Dataset '{name}' error: {message}")]
    Dataset {
        name: String,
        message: String,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A split resolved to nothing readable. Never retried.
    #[error("Dataset '{name}' has no record files for split '{split}'")]
    NotFound {
        name: String,
        split: String,
    },

    #[error("Concurrency violation: {message}")]
    ConcurrencyViolation {
        message: String,
    },

    #[error("Seed range exhausted: base {base} cannot supply {count} seed pair(s)")]
    SeedRange {
        base: i64,
        count: usize,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type Result<T> = std::result::Result<T, DataError>;

// Convenience constructors
impl DataError {

    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn dataset(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dataset {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn not_found(name: impl Into<String>, split: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            split: split.into(),
        }
    }

    pub fn concurrency(message: impl Into<String>) -> Self {
        Self::ConcurrencyViolation {
            message: message.into(),
        }
    }

    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true for conditions that indicate a corrupt or missing dataset
    /// build. Callers should abort rather than retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::ConcurrencyViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_fatal() {
        let err = DataError::not_found("squad", "train");
        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Dataset 'squad' has no record files for split 'train'"
        );
    }

    #[test]
    fn test_config_is_not_fatal() {
        let err = DataError::config("dataset 'glue' has multiple configs");
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("multiple configs"));
    }

    #[test]
    fn test_storage_source_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = DataError::storage_with_source("/data/x", "failed to open file", io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
