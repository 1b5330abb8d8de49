// rust/data-core/src/paths.rs

//! File names of preprocessed task caches and the directories searched for
//! them.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub fn info_path(dir: &Path, split: &str) -> PathBuf {
    dir.join(format!("info.{split}.json"))
}

pub fn stats_path(dir: &Path, split: &str) -> PathBuf {
    dir.join(format!("stats.{split}.json"))
}

/// Prefix shared by a split's cached record shards.
pub fn record_prefix(dir: &Path, split: &str) -> PathBuf {
    dir.join(format!("{split}.tfrecord"))
}

/// Ordered list of directories searched for cached tasks.
#[derive(Debug, Default)]
pub struct GlobalCacheDirs {
    dirs: RwLock<Vec<PathBuf>>,
}

impl GlobalCacheDirs {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs: RwLock::new(dirs),
        }
    }

    pub fn get(&self) -> Vec<PathBuf> {
        self.dirs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Replaces the list.
    pub fn set(&self, dirs: Vec<PathBuf>) {
        *self
            .dirs
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = dirs;
    }

    /// Appends to the list, keeping existing entries first.
    pub fn add<I>(&self, dirs: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.dirs
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend(dirs);
    }
}
