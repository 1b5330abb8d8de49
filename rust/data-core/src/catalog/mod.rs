// rust/data-core/src/catalog/mod.rs

//! Dataset catalog abstraction.
//!
//! A [`Catalog`] constructs [`DatasetBuilder`]s: immutable descriptors of a
//! prepared dataset (its splits, shard files and example counts) that can
//! also read records back. Builders are expensive to construct, so loaders
//! memoize them in a [`ResourceCache`](crate::cache::ResourceCache).
//!
//! [`LocalCatalog`] is the file-backed implementation shipped with this
//! crate; other storage systems plug in by implementing the traits.

mod local;
mod split;

pub use local::{DatasetWriter, LocalCatalog, INFO_FILENAME};
pub use split::{file_instructions, split_size, Bound, SplitSlice};

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::seed::Seed;

/// A dataset name of the form `dataset[/config][:version]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetName {
    pub dataset: String,
    pub config: Option<String>,
    pub version: Option<String>,
}

impl DatasetName {
    /// Parses `dataset[/config][:version]`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for empty components or extra `/`.
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || DataError::config(format!("invalid dataset name: '{name}'"));

        let (path, version) = match name.split_once(':') {
            Some((path, version)) => (path, Some(version)),
            None => (name, None),
        };
        let (dataset, config) = match path.split_once('/') {
            Some((dataset, config)) => (dataset, Some(config)),
            None => (path, None),
        };

        let non_empty =
            |part: &str| !part.is_empty() && !part.contains(|c: char| c == '/' || c == ':');
        if !non_empty(dataset)
            || config.is_some_and(|c| !non_empty(c))
            || version.is_some_and(|v| !non_empty(v))
        {
            return Err(invalid());
        }

        Ok(Self {
            dataset: dataset.to_string(),
            config: config.map(str::to_string),
            version: version.map(str::to_string),
        })
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dataset)?;
        if let Some(config) = &self.config {
            write!(f, "/{config}")?;
        }
        if let Some(version) = &self.version {
            write!(f, ":{version}")?;
        }
        Ok(())
    }
}

/// Declared metadata of a prepared dataset, stored as `dataset_info.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetInfo {
    pub name: String,
    pub version: String,
    /// Named builder configurations the dataset declares.
    pub configs: Vec<String>,
    pub splits: BTreeMap<String, SplitInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitInfo {
    /// Declared example count. Non-positive means "very large / unknown".
    pub num_examples: i64,
    pub shards: Vec<ShardInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardInfo {
    pub filename: String,
    pub num_examples: u64,
}

impl SplitInfo {
    /// Records actually present across all shards.
    pub fn shard_examples(&self) -> u64 {
        self.shards
            .iter()
            .fold(0u64, |total, s| total.saturating_add(s.num_examples))
    }
}

/// Which records of which shard file make up part of a split.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileInstruction {
    pub filename: String,
    /// Records to skip at the start of the file.
    pub skip: u64,
    /// Records to read after skipping.
    pub take: u64,
}

impl FileInstruction {
    pub fn num_examples(&self) -> u64 {
        self.take
    }
}

/// Declared size of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetSize {
    Finite(u64),
    /// The dataset declares a placeholder count; treat as unbounded.
    Unbounded,
}

impl DatasetSize {
    pub fn from_declared(num_examples: i64) -> Self {
        if num_examples > 0 {
            DatasetSize::Finite(num_examples as u64)
        } else {
            DatasetSize::Unbounded
        }
    }

    pub fn finite(&self) -> Option<u64> {
        match *self {
            DatasetSize::Finite(n) => Some(n),
            DatasetSize::Unbounded => None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, DatasetSize::Unbounded)
    }
}

/// Options for reading shard files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Shuffle the order in which files are read.
    pub shuffle_files: bool,
    /// Seed for the file shuffle; `Unspecified` draws from OS entropy.
    pub seed: Seed,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            shuffle_files: false,
            seed: Seed::Unspecified,
        }
    }
}

/// An immutable descriptor of a prepared dataset.
pub trait DatasetBuilder: Send + Sync + fmt::Debug {
    fn info(&self) -> &DatasetInfo;

    /// Reads the records selected by `instructions`.
    ///
    /// Without shuffling, records come back in instruction order and in file
    /// order within each instruction.
    fn read_files(
        &self,
        instructions: &[FileInstruction],
        options: &ReadOptions,
    ) -> Result<Vec<Vec<u8>>>;
}

/// Source of dataset builders.
pub trait Catalog: Send + Sync {
    /// Constructs the builder for `name`, reading from `data_dir` or the
    /// catalog's default directory when `None`.
    fn builder(&self, name: &DatasetName, data_dir: Option<&Path>)
        -> Result<Arc<dyn DatasetBuilder>>;
}
