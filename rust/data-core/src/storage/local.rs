// rust/data-core/src/storage/local.rs

//! Local filesystem storage backend implementation.
//!
//! Small files are read through a buffered reader; files at or above the
//! configured threshold are memory-mapped. Writes go to a temporary sibling
//! file which is renamed into place once synced.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use super::traits::{ObjectData, ObjectMeta, StorageBackend};
use crate::config::StorageConfig;
use crate::error::{DataError, Result};

/// Local filesystem storage backend.
#[derive(Debug)]
pub struct LocalStorage {
    /// Base path for all storage operations.
    base_path: PathBuf,
    /// Buffer size for buffered I/O operations.
    buffer_size: usize,
    /// Whether to use memory-mapped I/O.
    use_mmap: bool,
    /// File size threshold above which to use mmap.
    mmap_threshold: u64,
}

impl LocalStorage {
    /// Creates a new `LocalStorage` instance from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base path cannot be created.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let base_path = config.base_path.clone();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                DataError::storage_with_source(&base_path, "failed to create base directory", e)
            })?;
        }

        Ok(Self {
            base_path,
            buffer_size: config.buffer_size,
            use_mmap: config.use_mmap,
            mmap_threshold: config.mmap_threshold,
        })
    }

    /// Resolves a path relative to the base path.
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    fn create_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    DataError::storage_with_source(parent, "failed to create parent directories", e)
                })?;
            }
        }
        Ok(())
    }
}

impl StorageBackend for LocalStorage {
    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.resolve_path(path).exists())
    }

    fn metadata(&self, path: &Path) -> Result<ObjectMeta> {
        let full_path = self.resolve_path(path);
        let meta = fs::metadata(&full_path).map_err(|e| {
            DataError::storage_with_source(&full_path, "failed to read metadata", e)
        })?;

        Ok(ObjectMeta {
            size: meta.len(),
            is_dir: meta.is_dir(),
        })
    }

    fn read(&self, path: &Path) -> Result<ObjectData> {
        let full_path = self.resolve_path(path);
        let file = File::open(&full_path)
            .map_err(|e| DataError::storage_with_source(&full_path, "failed to open file", e))?;

        let size = file
            .metadata()
            .map_err(|e| {
                DataError::storage_with_source(&full_path, "failed to read file metadata", e)
            })?
            .len();

        // Empty files cannot be mapped on every platform.
        if self.use_mmap && size > 0 && size >= self.mmap_threshold {
            // SAFETY: The file is opened read-only and shard files are written
            // once via rename, never modified in place.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
                DataError::storage_with_source(&full_path, "failed to memory-map file", e)
            })?;
            return Ok(ObjectData::Mapped(mmap));
        }

        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut bytes = Vec::with_capacity(size as usize);
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| DataError::storage_with_source(&full_path, "failed to read file", e))?;
        Ok(ObjectData::Buffered(bytes))
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let full_path = self.resolve_path(path);
        Self::create_parent(&full_path)?;

        let mut tmp_name = full_path.as_os_str().to_owned();
        tmp_name.push(format!(".tmp-{}", std::process::id()));
        let tmp_path = PathBuf::from(tmp_name);

        let file = File::create(&tmp_path).map_err(|e| {
            DataError::storage_with_source(&tmp_path, "failed to create file", e)
        })?;
        let mut writer = BufWriter::with_capacity(self.buffer_size, file);
        writer
            .write_all(data)
            .and_then(|_| writer.flush())
            .map_err(|e| DataError::storage_with_source(&tmp_path, "failed to write file", e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| DataError::storage_with_source(&tmp_path, "failed to sync file to disk", e))?;
        drop(writer);

        fs::rename(&tmp_path, &full_path).map_err(|e| {
            DataError::storage_with_source(
                &tmp_path,
                format!("failed to rename to {}", full_path.display()),
                e,
            )
        })
    }

    fn list(&self, prefix: &Path) -> Result<Vec<String>> {
        let full_path = self.resolve_path(prefix);

        if !full_path.exists() {
            return Ok(Vec::new());
        }

        if !full_path.is_dir() {
            return Err(DataError::storage(&full_path, "path is not a directory"));
        }

        let mut entries = Vec::new();

        for entry in fs::read_dir(&full_path).map_err(|e| {
            DataError::storage_with_source(&full_path, "failed to read directory", e)
        })? {
            let entry = entry.map_err(|e| {
                DataError::storage_with_source(&full_path, "failed to read directory entry", e)
            })?;

            if let Some(name) = entry.file_name().to_str() {
                entries.push(name.to_string());
            }
        }

        entries.sort();
        Ok(entries)
    }
}
