// rust/data-core/src/config.rs

//! Configuration management for the data-loading core.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{DataError, Result};
use crate::records::parse_format;

// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub seeds: SeedConfig,
    pub loader: LoaderConfig,
}

// Storage configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Root that relative dataset directories are resolved against.
    pub base_path: PathBuf,
    // Buffer size in bytes for I/O operations.
    pub buffer_size: usize,
    // Whether to use memory-mapped I/O.
    pub use_mmap: bool,
    // File size threshold (bytes) at or above which to use mmap.
    pub mmap_threshold: u64,
}

/// Dataset catalog options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Directory datasets are read from when a loader names none.
    pub data_dir: PathBuf,
    /// Directory that replaces every loader's own directory when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir_override: Option<PathBuf>,
    /// Shard record framing: "length-prefixed" or "newline".
    pub record_format: String,
    /// Directories searched for preprocessed task caches.
    pub global_cache_dirs: Vec<PathBuf>,
}

/// Seed scope options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Base seed for pipeline scopes; unset keeps stages non-deterministic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_seed: Option<i32>,
}

/// Loader defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    // Whether shard file order is shuffled when loading a whole split.
    pub shuffle_files: bool,
    // Worker threads for parallel map stages.
    pub parallel_workers: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./data"),
            buffer_size: 64 * 1024, // 64 KB
            use_mmap: true,
            mmap_threshold: 1024 * 1024, // 1 MB
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("datasets"),
            data_dir_override: None,
            record_format: "length-prefixed".to_string(),
            global_cache_dirs: Vec::new(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            shuffle_files: false,
            parallel_workers: 4,
        }
    }
}

impl FromStr for DataConfig {
    type Err = DataError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| DataError::config_with_source("failed to parse TOML config", e))
    }
}

impl DataConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataError::storage_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `T2T_` and use underscores
    // to separate nested fields. For example:
    // - `T2T_STORAGE_BASE_PATH` overrides `storage.base_path`
    // - `T2T_CATALOG_DATA_DIR_OVERRIDE` overrides `catalog.data_dir_override`
    // - `T2T_CATALOG_GLOBAL_CACHE_DIRS` is a comma-separated list
    // - `T2T_SEEDS_INITIAL_SEED` overrides `seeds.initial_seed`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Storage overrides
        if let Ok(val) = std::env::var("T2T_STORAGE_BASE_PATH") {
            self.storage.base_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("T2T_STORAGE_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.storage.buffer_size = v;
            }
        }
        if let Ok(val) = std::env::var("T2T_STORAGE_USE_MMAP") {
            if let Ok(v) = val.parse() {
                self.storage.use_mmap = v;
            }
        }
        if let Ok(val) = std::env::var("T2T_STORAGE_MMAP_THRESHOLD") {
            if let Ok(v) = val.parse() {
                self.storage.mmap_threshold = v;
            }
        }

        // Catalog overrides
        if let Ok(val) = std::env::var("T2T_CATALOG_DATA_DIR") {
            self.catalog.data_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("T2T_CATALOG_DATA_DIR_OVERRIDE") {
            self.catalog.data_dir_override = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
        if let Ok(val) = std::env::var("T2T_CATALOG_RECORD_FORMAT") {
            self.catalog.record_format = val;
        }
        if let Ok(val) = std::env::var("T2T_CATALOG_GLOBAL_CACHE_DIRS") {
            self.catalog.global_cache_dirs = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
        }

        // Seed overrides
        if let Ok(val) = std::env::var("T2T_SEEDS_INITIAL_SEED") {
            if let Ok(v) = val.parse() {
                self.seeds.initial_seed = Some(v);
            }
        }

        // Loader overrides
        if let Ok(val) = std::env::var("T2T_LOADER_SHUFFLE_FILES") {
            if let Ok(v) = val.parse() {
                self.loader.shuffle_files = v;
            }
        }
        if let Ok(val) = std::env::var("T2T_LOADER_PARALLEL_WORKERS") {
            if let Ok(v) = val.parse() {
                self.loader.parallel_workers = v;
            }
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.buffer_size == 0 {
            return Err(DataError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }

        parse_format(&self.catalog.record_format).map_err(|e| {
            DataError::config_with_source("catalog.record_format is invalid", e)
        })?;

        if self.loader.parallel_workers == 0 {
            return Err(DataError::config(
                "loader.parallel_workers must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = DataConfig::default();

        assert_eq!(config.storage.base_path, PathBuf::from("./data"));
        assert_eq!(config.storage.buffer_size, 64 * 1024);
        assert!(config.storage.use_mmap);

        assert_eq!(config.catalog.data_dir, PathBuf::from("datasets"));
        assert!(config.catalog.data_dir_override.is_none());
        assert_eq!(config.catalog.record_format, "length-prefixed");
        assert!(config.catalog.global_cache_dirs.is_empty());

        assert!(config.seeds.initial_seed.is_none());
        assert!(!config.loader.shuffle_files);
        assert_eq!(config.loader.parallel_workers, 4);
    }

    #[test]
    fn test_default_validates() {
        assert!(DataConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_str_empty() {
        let config: DataConfig = "".parse().unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_full() {
        let toml = r#"
            [storage]
            base_path = "/data/t2t"
            buffer_size = 131072
            use_mmap = false

            [catalog]
            data_dir = "tfds"
            data_dir_override = "/mnt/override"
            record_format = "newline"
            global_cache_dirs = ["/cache/a", "/cache/b"]

            [seeds]
            initial_seed = 42

            [loader]
            shuffle_files = true
            parallel_workers = 8
        "#;

        let config: DataConfig = toml.parse().unwrap();

        assert_eq!(config.storage.base_path, PathBuf::from("/data/t2t"));
        assert_eq!(config.storage.buffer_size, 131072);
        assert!(!config.storage.use_mmap);
        // Unspecified fields keep their defaults
        assert_eq!(config.storage.mmap_threshold, 1024 * 1024);

        assert_eq!(config.catalog.data_dir, PathBuf::from("tfds"));
        assert_eq!(
            config.catalog.data_dir_override,
            Some(PathBuf::from("/mnt/override"))
        );
        assert_eq!(config.catalog.record_format, "newline");
        assert_eq!(config.catalog.global_cache_dirs.len(), 2);

        assert_eq!(config.seeds.initial_seed, Some(42));
        assert!(config.loader.shuffle_files);
        assert_eq!(config.loader.parallel_workers, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result: std::result::Result<DataConfig, _> = "invalid = [".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [seeds]
            initial_seed = 7
            "#
        )
        .unwrap();

        let config = DataConfig::from_file(file.path()).unwrap();
        assert_eq!(config.seeds.initial_seed, Some(7));
    }

    #[test]
    fn test_from_file_not_found() {
        assert!(DataConfig::from_file("/nonexistent/config.toml").is_err());
    }

    #[test]
    fn test_validate_invalid_buffer_size() {
        let mut config = DataConfig::default();
        config.storage.buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_invalid_record_format() {
        let mut config = DataConfig::default();
        config.catalog.record_format = "tfrecord".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("record_format"));
    }

    #[test]
    fn test_validate_invalid_workers() {
        let mut config = DataConfig::default();
        config.loader.parallel_workers = 0;
        assert!(config.validate().is_err());
    }

    // Helper to clear all T2T_ environment variables for test isolation
    fn clear_t2t_env_vars() {
        for (key, _) in std::env::vars() {
            if key.starts_with("T2T_") {
                std::env::remove_var(&key);
            }
        }
    }

    // Environment variable tests are combined into a single test to avoid
    // race conditions when tests run in parallel, since env vars are global state.
    #[test]
    fn test_env_overrides() {
        clear_t2t_env_vars();

        std::env::set_var("T2T_STORAGE_BASE_PATH", "/env/path");
        std::env::set_var("T2T_CATALOG_DATA_DIR_OVERRIDE", "/env/override");
        std::env::set_var("T2T_CATALOG_GLOBAL_CACHE_DIRS", "/c1, /c2,");
        std::env::set_var("T2T_SEEDS_INITIAL_SEED", "-12");
        std::env::set_var("T2T_LOADER_PARALLEL_WORKERS", "2");

        let config = DataConfig::default().with_env_overrides();

        assert_eq!(config.storage.base_path, PathBuf::from("/env/path"));
        assert_eq!(
            config.catalog.data_dir_override,
            Some(PathBuf::from("/env/override"))
        );
        assert_eq!(
            config.catalog.global_cache_dirs,
            vec![PathBuf::from("/c1"), PathBuf::from("/c2")]
        );
        assert_eq!(config.seeds.initial_seed, Some(-12));
        assert_eq!(config.loader.parallel_workers, 2);

        clear_t2t_env_vars();

        // Invalid values are ignored and an empty override clears it
        std::env::set_var("T2T_STORAGE_BUFFER_SIZE", "not_a_number");
        std::env::set_var("T2T_CATALOG_DATA_DIR_OVERRIDE", "");

        let mut base = DataConfig::default();
        base.catalog.data_dir_override = Some(PathBuf::from("/from/file"));
        let config = base.with_env_overrides();

        assert_eq!(config.storage.buffer_size, 64 * 1024);
        assert!(config.catalog.data_dir_override.is_none());

        clear_t2t_env_vars();
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut original = DataConfig::default();
        original.seeds.initial_seed = Some(3);
        let toml_str = toml::to_string(&original).unwrap();
        let parsed: DataConfig = toml_str.parse().unwrap();

        assert_eq!(original.storage.base_path, parsed.storage.base_path);
        assert_eq!(original.catalog.record_format, parsed.catalog.record_format);
        assert_eq!(parsed.seeds.initial_seed, Some(3));
    }
}
