// rust/data-core/src/runtime.rs

//! Process-wide data-loading context.
//!
//! [`DataRuntime`] is built once from configuration and owns the pieces
//! every pipeline shares: the storage backend, the dataset catalog, the
//! builder cache (with its directory override), the seed sequencer and the
//! global cache directories.
//!
//! # Example
//!
//! ```no_run
//! use data_core::{DataRuntime, MapStage, Seed};
//!
//! let runtime = DataRuntime::new().unwrap();
//!
//! let loader = runtime.loader("squad", None).unwrap();
//! println!("train size: {:?}", loader.size("train").unwrap());
//!
//! let _scope = runtime.enter_seed_scope();
//! let noise = MapStage::with_seed(|x: Vec<u8>, _: &(), seed: Seed| (x.len(), seed));
//! let records = runtime.load(&loader, "train").unwrap();
//! let _lengths = runtime.apply_parallel(&noise, records, ()).unwrap();
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::catalog::{Catalog, LocalCatalog};
use crate::config::DataConfig;
use crate::error::Result;
use crate::loader::{BuilderCache, LazyLoader};
use crate::paths::GlobalCacheDirs;
use crate::records::parse_format;
use crate::seed::{ScopeGuard, Seed, SeedSequencer};
use crate::stage::MapStage;
use crate::storage::{LocalStorage, StorageBackend};

/// Shared context for dataset loading and seeded stages.
pub struct DataRuntime {
    config: DataConfig,
    storage: Arc<dyn StorageBackend>,
    catalog: Arc<dyn Catalog>,
    cache: Arc<BuilderCache>,
    sequencer: SeedSequencer,
    cache_dirs: GlobalCacheDirs,
}

impl DataRuntime {
    /// Creates a runtime with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend cannot be initialized.
    pub fn new() -> Result<Self> {
        Self::from_config(DataConfig::default())
    }

    /// Creates a runtime from a TOML configuration file, applying `T2T_*`
    /// environment overrides on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or is invalid.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = DataConfig::from_file(path)?.with_env_overrides();
        Self::from_config(config)
    }

    /// Creates a runtime from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the storage
    /// backend cannot be initialized.
    pub fn from_config(config: DataConfig) -> Result<Self> {
        config.validate()?;

        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&config.storage)?);
        let format = parse_format(&config.catalog.record_format)?;
        let catalog: Arc<dyn Catalog> = Arc::new(LocalCatalog::new(
            Arc::clone(&storage),
            config.catalog.data_dir.clone(),
            format,
        ));

        let cache = Arc::new(BuilderCache::new());
        cache.set_override(config.catalog.data_dir_override.clone());

        info!(
            base_path = %config.storage.base_path.display(),
            data_dir = %config.catalog.data_dir.display(),
            record_format = %config.catalog.record_format,
            "Initialized data runtime"
        );

        Ok(Self {
            cache_dirs: GlobalCacheDirs::new(config.catalog.global_cache_dirs.clone()),
            config,
            storage,
            catalog,
            cache,
            sequencer: SeedSequencer::new(),
        })
    }

    /// Creates a loader reading from the catalog's default directory.
    pub fn loader(
        &self,
        name: &str,
        split_map: Option<HashMap<String, String>>,
    ) -> Result<LazyLoader> {
        self.loader_with_dir(name, None, split_map)
    }

    /// Creates a loader reading from `data_dir`.
    pub fn loader_in(
        &self,
        name: &str,
        data_dir: impl Into<PathBuf>,
        split_map: Option<HashMap<String, String>>,
    ) -> Result<LazyLoader> {
        self.loader_with_dir(name, Some(data_dir.into()), split_map)
    }

    fn loader_with_dir(
        &self,
        name: &str,
        data_dir: Option<PathBuf>,
        split_map: Option<HashMap<String, String>>,
    ) -> Result<LazyLoader> {
        LazyLoader::new(
            name,
            data_dir,
            split_map,
            Arc::clone(&self.catalog),
            Arc::clone(&self.cache),
        )
    }

    /// Sets or clears the directory that overrides every loader's own.
    pub fn set_data_dir_override(&self, data_dir: Option<PathBuf>) {
        self.cache.set_override(data_dir);
    }

    /// Enters a seed scope based at the configured initial seed.
    pub fn enter_seed_scope(&self) -> ScopeGuard<'_> {
        self.sequencer.enter_scope(self.config.seeds.initial_seed)
    }

    /// Reads every record of `split` through `loader`, shuffling shard order
    /// when `loader.shuffle_files` is configured.
    ///
    /// The shuffle seed is drawn from the active seed scope, so a scope with
    /// a configured initial seed reproduces the same order.
    pub fn load(&self, loader: &LazyLoader, split: &str) -> Result<Vec<Vec<u8>>> {
        let shuffle_files = self.config.loader.shuffle_files;
        let seed = if shuffle_files {
            self.sequencer
                .next_seeds(1)?
                .pop()
                .unwrap_or(Seed::Unspecified)
        } else {
            Seed::Unspecified
        };
        loader.load(split, shuffle_files, seed)
    }

    /// Runs `stage` over `input` with the configured number of workers.
    pub fn apply_parallel<T, A, U>(
        &self,
        stage: &MapStage<T, A, U>,
        input: Vec<T>,
        args: A,
    ) -> Result<Vec<U>>
    where
        T: Send,
        A: Sync,
        U: Send,
    {
        stage.apply_parallel(
            &self.sequencer,
            input,
            args,
            self.config.loader.parallel_workers,
        )
    }

    pub fn sequencer(&self) -> &SeedSequencer {
        &self.sequencer
    }

    pub fn cache(&self) -> &Arc<BuilderCache> {
        &self.cache
    }

    pub fn cache_dirs(&self) -> &GlobalCacheDirs {
        &self.cache_dirs
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    /// Returns a reference to the storage backend.
    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }
}

impl std::fmt::Debug for DataRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataRuntime")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("sequencer", &self.sequencer)
            .finish_non_exhaustive()
    }
}
