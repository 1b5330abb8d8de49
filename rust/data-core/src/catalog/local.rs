// rust/data-core/src/catalog/local.rs

//! File-backed catalog.
//!
//! Prepared datasets live under a data directory as
//! `<dataset>/<config>/<version>/`, holding a `dataset_info.toml` and the
//! split shard files (`<split>.records-NNNNN-of-MMMMM`). Datasets without
//! named configs use the `default` config directory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use super::{
    Catalog, DatasetBuilder, DatasetInfo, DatasetName, FileInstruction, ReadOptions, ShardInfo,
    SplitInfo,
};
use crate::error::{DataError, Result};
use crate::records::RecordFormat;
use crate::storage::StorageBackend;

/// Name of the metadata file in each dataset version directory.
pub const INFO_FILENAME: &str = "dataset_info.toml";

const DEFAULT_CONFIG: &str = "default";
const DEFAULT_VERSION: &str = "1.0.0";

/// Catalog reading prepared datasets through a [`StorageBackend`].
pub struct LocalCatalog {
    storage: Arc<dyn StorageBackend>,
    default_data_dir: PathBuf,
    format: Arc<dyn RecordFormat>,
}

impl LocalCatalog {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        default_data_dir: impl Into<PathBuf>,
        format: Arc<dyn RecordFormat>,
    ) -> Self {
        Self {
            storage,
            default_data_dir: default_data_dir.into(),
            format,
        }
    }

    fn pick_config(&self, name: &DatasetName, dataset_dir: &Path) -> Result<String> {
        let entries = self.entries(name, dataset_dir)?;
        match &name.config {
            Some(config) if entries.contains(config) => Ok(config.clone()),
            Some(config) => Err(DataError::dataset(
                name.to_string(),
                format!("unknown config '{config}' (available: {})", entries.join(", ")),
            )),
            None if entries.iter().any(|e| e == DEFAULT_CONFIG) => Ok(DEFAULT_CONFIG.to_string()),
            // Sorted by the backend; the builder's declared configs are
            // checked by the loader.
            None => Ok(entries[0].clone()),
        }
    }

    fn pick_version(&self, name: &DatasetName, config_dir: &Path) -> Result<String> {
        let entries = self.entries(name, config_dir)?;
        match &name.version {
            Some(version) if entries.contains(version) => Ok(version.clone()),
            Some(version) => Err(DataError::dataset(
                name.to_string(),
                format!("version '{version}' is not prepared (available: {})", entries.join(", ")),
            )),
            None => entries
                .into_iter()
                .max_by(|a, b| version_key(a).cmp(&version_key(b)))
                .ok_or_else(|| DataError::dataset(name.to_string(), "no prepared versions")),
        }
    }

    /// Lists a directory, treating an empty listing as a missing dataset.
    fn entries(&self, name: &DatasetName, dir: &Path) -> Result<Vec<String>> {
        let entries = self.storage.list(dir)?;
        if entries.is_empty() {
            return Err(DataError::dataset(
                name.to_string(),
                format!("no prepared data at '{}'", dir.display()),
            ));
        }
        Ok(entries)
    }

    fn read_info(&self, dir: &Path) -> Result<DatasetInfo> {
        let path = dir.join(INFO_FILENAME);
        let data = self.storage.read(&path)?;
        let text = std::str::from_utf8(&data).map_err(|e| {
            DataError::serialization_with_source(format!("{} is not UTF-8", path.display()), e)
        })?;
        toml::from_str(text).map_err(|e| {
            DataError::serialization_with_source(format!("failed to parse {}", path.display()), e)
        })
    }
}

impl fmt::Debug for LocalCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCatalog")
            .field("default_data_dir", &self.default_data_dir)
            .field("format", &self.format.name())
            .finish_non_exhaustive()
    }
}

impl Catalog for LocalCatalog {
    fn builder(
        &self,
        name: &DatasetName,
        data_dir: Option<&Path>,
    ) -> Result<Arc<dyn DatasetBuilder>> {
        let dataset_dir = data_dir.unwrap_or(&self.default_data_dir).join(&name.dataset);
        let config = self.pick_config(name, &dataset_dir)?;
        let config_dir = dataset_dir.join(&config);
        let version = self.pick_version(name, &config_dir)?;
        let dir = config_dir.join(&version);

        let info = self.read_info(&dir)?;
        debug!(
            dataset = %name,
            dir = %dir.display(),
            splits = info.splits.len(),
            "Constructed dataset builder"
        );

        Ok(Arc::new(LocalBuilder {
            info,
            dir,
            storage: Arc::clone(&self.storage),
            format: Arc::clone(&self.format),
        }))
    }
}

/// Dotted-numeric ordering; non-numeric components sort as zero.
fn version_key(version: &str) -> Vec<u64> {
    version.split('.').map(|part| part.parse().unwrap_or(0)).collect()
}

struct LocalBuilder {
    info: DatasetInfo,
    dir: PathBuf,
    storage: Arc<dyn StorageBackend>,
    format: Arc<dyn RecordFormat>,
}

impl fmt::Debug for LocalBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalBuilder")
            .field("name", &self.info.name)
            .field("version", &self.info.version)
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl DatasetBuilder for LocalBuilder {
    fn info(&self) -> &DatasetInfo {
        &self.info
    }

    fn read_files(
        &self,
        instructions: &[FileInstruction],
        options: &ReadOptions,
    ) -> Result<Vec<Vec<u8>>> {
        let mut order: Vec<&FileInstruction> = instructions.iter().collect();
        if options.shuffle_files {
            match options.seed.to_u64() {
                Some(seed) => order.shuffle(&mut StdRng::seed_from_u64(seed)),
                None => order.shuffle(&mut rand::thread_rng()),
            }
        }

        let mut records = Vec::new();
        for instruction in order {
            let data = self.storage.read(&self.dir.join(&instruction.filename))?;
            let shard = self.format.split_records(&data)?;

            let end = instruction
                .skip
                .checked_add(instruction.take)
                .ok_or_else(|| {
                    DataError::dataset(
                        self.info.name.clone(),
                        format!(
                            "shard '{}' instruction skip {} + take {} overflows",
                            instruction.filename, instruction.skip, instruction.take
                        ),
                    )
                })?;
            if end > shard.len() as u64 {
                return Err(DataError::dataset(
                    self.info.name.clone(),
                    format!(
                        "shard '{}' holds {} records but {} were requested",
                        instruction.filename,
                        shard.len(),
                        end
                    ),
                ));
            }
            records.extend(
                shard[instruction.skip as usize..end as usize]
                    .iter()
                    .map(|record| record.to_vec()),
            );
        }

        debug!(
            dataset = %self.info.name,
            files = instructions.len(),
            records = records.len(),
            "Read shard files"
        );
        Ok(records)
    }
}

/// Materializes a prepared dataset in the [`LocalCatalog`] layout.
pub struct DatasetWriter {
    storage: Arc<dyn StorageBackend>,
    format: Arc<dyn RecordFormat>,
    dir: PathBuf,
    info: DatasetInfo,
}

impl DatasetWriter {
    /// Starts a dataset named `dataset[/config][:version]` under `data_dir`.
    pub fn create(
        storage: Arc<dyn StorageBackend>,
        format: Arc<dyn RecordFormat>,
        data_dir: &Path,
        name: &str,
    ) -> Result<Self> {
        let name = DatasetName::parse(name)?;
        let config = name.config.as_deref().unwrap_or(DEFAULT_CONFIG);
        let version = name.version.as_deref().unwrap_or(DEFAULT_VERSION);
        let dir = data_dir.join(&name.dataset).join(config).join(version);

        Ok(Self {
            storage,
            format,
            dir,
            info: DatasetInfo {
                name: name.dataset.clone(),
                version: version.to_string(),
                ..Default::default()
            },
        })
    }

    /// Declares the named configs of a multi-config dataset.
    pub fn with_configs<I, S>(mut self, configs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.info.configs = configs.into_iter().map(Into::into).collect();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes one shard file per entry of `shards`.
    ///
    /// The split's declared count is set to the records written; override it
    /// with [`declare_num_examples`](Self::declare_num_examples).
    pub fn write_split(&mut self, split: &str, shards: &[Vec<Vec<u8>>]) -> Result<()> {
        if split.is_empty() || split.contains(|c: char| "[]:+%/".contains(c)) {
            return Err(DataError::config(format!("invalid split name: '{split}'")));
        }

        let mut written = Vec::with_capacity(shards.len());
        for (index, records) in shards.iter().enumerate() {
            let filename = format!("{split}.records-{index:05}-of-{:05}", shards.len());
            let mut buf = Vec::new();
            for record in records {
                self.format.encode(record, &mut buf)?;
            }
            self.storage.write(&self.dir.join(&filename), &buf)?;
            written.push(ShardInfo {
                filename,
                num_examples: records.len() as u64,
            });
        }

        let total: u64 = written.iter().map(|s| s.num_examples).sum();
        self.info.splits.insert(
            split.to_string(),
            SplitInfo {
                num_examples: total as i64,
                shards: written,
            },
        );
        Ok(())
    }

    /// Overrides the declared example count of a written split.
    pub fn declare_num_examples(&mut self, split: &str, num_examples: i64) -> Result<()> {
        let entry = self
            .info
            .splits
            .get_mut(split)
            .ok_or_else(|| DataError::config(format!("split '{split}' has not been written")))?;
        entry.num_examples = num_examples;
        Ok(())
    }

    /// Writes the info file and returns the final metadata.
    pub fn finish(self) -> Result<DatasetInfo> {
        let text = toml::to_string_pretty(&self.info).map_err(|e| {
            DataError::serialization_with_source("failed to serialize dataset info", e)
        })?;
        self.storage.write(&self.dir.join(INFO_FILENAME), text.as_bytes())?;

        info!(
            dataset = %self.info.name,
            version = %self.info.version,
            dir = %self.dir.display(),
            splits = self.info.splits.len(),
            "Wrote prepared dataset"
        );
        Ok(self.info)
    }
}
