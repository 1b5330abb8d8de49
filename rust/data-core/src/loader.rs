// rust/data-core/src/loader.rs

//! Lazily resolved, memoized access to one prepared dataset.
//!
//! A [`LazyLoader`] is cheap to construct: it only records the dataset name,
//! directory and split mapping. The dataset builder is constructed on first
//! use through the shared [`BuilderCache`], keyed by the name and the
//! directory in effect at that moment (so a global override set later
//! selects a different builder).

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error};

use crate::cache::{ResourceCache, ResourceKey};
use crate::catalog::{
    file_instructions, split_size, Catalog, DatasetBuilder, DatasetInfo, DatasetName,
    DatasetSize, FileInstruction, ReadOptions,
};
use crate::error::{DataError, Result};
use crate::seed::Seed;

/// Cache of constructed dataset builders shared by every loader.
pub type BuilderCache = ResourceCache<dyn DatasetBuilder>;

pub struct LazyLoader {
    name: String,
    parsed: DatasetName,
    data_dir: Option<PathBuf>,
    split_map: Option<HashMap<String, String>>,
    catalog: Arc<dyn Catalog>,
    cache: Arc<BuilderCache>,
}

impl LazyLoader {
    /// Creates a loader for `name` (`dataset[/config][:version]`).
    ///
    /// `split_map` maps canonical split names (e.g. `validation`) to split
    /// expressions (e.g. `train[:1%]`).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `name` is malformed.
    pub fn new(
        name: impl Into<String>,
        data_dir: Option<PathBuf>,
        split_map: Option<HashMap<String, String>>,
        catalog: Arc<dyn Catalog>,
        cache: Arc<BuilderCache>,
    ) -> Result<Self> {
        let name = name.into();
        let parsed = DatasetName::parse(&name)?;
        Ok(Self {
            name,
            parsed,
            data_dir,
            split_map,
            catalog,
            cache,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory in effect for this loader: the cache-wide override if set,
    /// otherwise the loader's own directory.
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.cache
            .resolve_data_dir(&self.name, self.data_dir.as_deref())
    }

    /// Maps a canonical split name through the split map. Names the map does
    /// not mention pass through unchanged.
    pub fn resolve_split<'a>(&'a self, split: &'a str) -> &'a str {
        self.split_map
            .as_ref()
            .and_then(|map| map.get(split))
            .map_or(split, String::as_str)
    }

    /// The memoized builder for this dataset and current directory.
    pub fn builder(&self) -> Result<Arc<dyn DatasetBuilder>> {
        let data_dir = self.data_dir();
        let key = ResourceKey::new(self.name.clone(), data_dir.clone());
        self.cache
            .get_or_load(key, || self.catalog.builder(&self.parsed, data_dir.as_deref()))
    }

    pub fn info(&self) -> Result<DatasetInfo> {
        Ok(self.builder()?.info().clone())
    }

    /// File instructions that make up `split`.
    ///
    /// # Errors
    ///
    /// - A configuration error when the dataset declares named configs and
    ///   the loader name selects none.
    /// - [`DataError::NotFound`] when the split resolves to no records. This
    ///   is fatal: the prepared data is missing or corrupt.
    pub fn files(&self, split: &str) -> Result<Vec<FileInstruction>> {
        let expr = self.resolve_split(split);
        let builder = self.builder()?;

        if self.parsed.config.is_none() && !builder.info().configs.is_empty() {
            return Err(DataError::config(format!(
                "Dataset '{}' has multiple configs",
                self.name
            )));
        }

        let files = file_instructions(builder.info(), expr)?;
        if files.is_empty() {
            error!("No record files found for dataset: {}", self.name);
            return Err(DataError::not_found(self.name.clone(), expr));
        }
        Ok(files)
    }

    /// Declared number of examples in `split`.
    pub fn size(&self, split: &str) -> Result<DatasetSize> {
        let builder = self.builder()?;
        split_size(builder.info(), self.resolve_split(split))
    }

    /// Reads every record of `split`.
    ///
    /// With `shuffle_files`, shard order is shuffled using `seed`, or OS
    /// entropy when the seed is unspecified.
    pub fn load(&self, split: &str, shuffle_files: bool, seed: Seed) -> Result<Vec<Vec<u8>>> {
        let expr = self.resolve_split(split);
        let builder = self.builder()?;
        let files = file_instructions(builder.info(), expr)?;
        debug!(dataset = %self.name, split = expr, files = files.len(), "Loading split");

        builder.read_files(
            &files,
            &ReadOptions {
                shuffle_files,
                seed,
            },
        )
    }

    /// Reads the records selected by one file instruction.
    pub fn load_shard(
        &self,
        instruction: &FileInstruction,
        shuffle_files: bool,
        seed: Seed,
    ) -> Result<Vec<Vec<u8>>> {
        self.builder()?.read_files(
            std::slice::from_ref(instruction),
            &ReadOptions {
                shuffle_files,
                seed,
            },
        )
    }
}

impl fmt::Debug for LazyLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyLoader")
            .field("name", &self.name)
            .field("data_dir", &self.data_dir)
            .field("split_map", &self.split_map)
            .finish_non_exhaustive()
    }
}
