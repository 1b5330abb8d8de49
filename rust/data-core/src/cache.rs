// rust/data-core/src/cache.rs

//! Load-once memoization of expensive, immutable dataset descriptors.
//!
//! A [`ResourceCache`] maps a [`ResourceKey`] to a shared descriptor. The
//! first caller for a key runs its loader; everyone else, including callers
//! racing on the same key, receives the same `Arc`. Each key has its own
//! slot lock, so a slow load never stalls lookups of unrelated keys.
//!
//! The cache also carries the data directory override that takes precedence
//! over the directory any individual loader was constructed with.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::error::Result;

/// Cache key: dataset name plus the directory it is read from.
///
/// `data_dir: None` means "catalog default" and never equals any explicit
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub name: String,
    pub data_dir: Option<PathBuf>,
}

impl ResourceKey {
    pub fn new(name: impl Into<String>, data_dir: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            data_dir,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data_dir {
            Some(dir) => write!(f, "{}@{}", self.name, dir.display()),
            None => write!(f, "{}@<default>", self.name),
        }
    }
}

type Slot<D> = Arc<Mutex<Option<Arc<D>>>>;

/// Memoizing registry of shared descriptors.
pub struct ResourceCache<D: ?Sized> {
    entries: Mutex<HashMap<ResourceKey, Slot<D>>>,
    data_dir_override: RwLock<Option<PathBuf>>,
}

impl<D: ?Sized> Default for ResourceCache<D> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            data_dir_override: RwLock::new(None),
        }
    }
}

impl<D: ?Sized> ResourceCache<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the descriptor for `key`, running `loader` if it is absent.
    ///
    /// Concurrent callers for the same absent key wait for the single
    /// in-flight load and observe its result.
    ///
    /// # Errors
    ///
    /// Returns whatever `loader` fails with. Failures are not cached; the
    /// next call for the key runs its own loader.
    pub fn get_or_load<F>(&self, key: ResourceKey, loader: F) -> Result<Arc<D>>
    where
        F: FnOnce() -> Result<Arc<D>>,
    {
        let slot = {
            let mut entries = self.entries_recovering();
            Arc::clone(entries.entry(key.clone()).or_default())
        };

        // A loader that panicked leaves the slot empty, which is a valid state.
        let mut value = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = value.as_ref() {
            tracing::debug!(key = %key, "resource cache hit");
            return Ok(Arc::clone(existing));
        }

        tracing::debug!(key = %key, "loading resource");
        match loader() {
            Ok(loaded) => {
                *value = Some(Arc::clone(&loaded));
                Ok(loaded)
            }
            Err(err) => {
                drop(value);
                self.forget_empty_slot(&key, &slot);
                Err(err)
            }
        }
    }

    // Drops the map entry for a failed load unless another caller is already
    // waiting on the slot. Slots are only cloned under the map lock, so the
    // count is stable while it is held.
    fn forget_empty_slot(&self, key: &ResourceKey, slot: &Slot<D>) {
        let mut entries = self.entries_recovering();
        let unshared = entries
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2);
        if unshared {
            entries.remove(key);
        }
    }

    /// Returns the descriptor for `key` if it has been loaded.
    pub fn get(&self, key: &ResourceKey) -> Option<Arc<D>> {
        let slot = self.entries_recovering().get(key).cloned()?;
        let value = slot.lock().unwrap_or_else(PoisonError::into_inner);
        value.clone()
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.get(key).is_some()
    }

    /// Number of loaded descriptors.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot<D>> = self.entries_recovering().values().cloned().collect();
        slots
            .iter()
            .filter(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached descriptor. Outstanding `Arc`s stay valid.
    pub fn clear(&self) {
        self.entries_recovering().clear();
    }

    /// Sets or clears the directory override for every loader sharing this
    /// cache.
    pub fn set_override(&self, data_dir: Option<PathBuf>) {
        tracing::debug!(data_dir = ?data_dir, "setting data directory override");
        *self
            .data_dir_override
            .write()
            .unwrap_or_else(PoisonError::into_inner) = data_dir;
    }

    pub fn data_dir_override(&self) -> Option<PathBuf> {
        self.data_dir_override
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolves the directory a loader named `name` should read from.
    ///
    /// The override wins over `own`; a warning is logged when both are set
    /// and differ.
    pub fn resolve_data_dir(&self, name: &str, own: Option<&Path>) -> Option<PathBuf> {
        match (self.data_dir_override(), own) {
            (Some(override_dir), Some(own)) => {
                if override_dir != own {
                    tracing::warn!(
                        "Overriding data directory '{}' with '{}' for dataset '{}'",
                        own.display(),
                        override_dir.display(),
                        name
                    );
                }
                Some(override_dir)
            }
            (Some(override_dir), None) => Some(override_dir),
            (None, own) => own.map(Path::to_path_buf),
        }
    }

    fn entries_recovering(&self) -> MutexGuard<'_, HashMap<ResourceKey, Slot<D>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: ?Sized> fmt::Debug for ResourceCache<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("entries", &self.len())
            .field("data_dir_override", &self.data_dir_override())
            .finish()
    }
}
