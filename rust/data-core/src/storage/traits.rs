// rust/data-core/src/storage/traits.rs

//! Storage abstraction used by the dataset catalog.

use std::fmt;
use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap;

use crate::error::Result;

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Size of the object in bytes.
    pub size: u64,
    /// Whether this object is a directory.
    pub is_dir: bool,
}

/// Contents of a stored object, either copied into memory or mapped.
pub enum ObjectData {
    Buffered(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for ObjectData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            ObjectData::Buffered(bytes) => bytes.as_slice(),
            ObjectData::Mapped(mmap) => &mmap[..],
        }
    }
}

impl AsRef<[u8]> for ObjectData {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl fmt::Debug for ObjectData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ObjectData::Buffered(_) => "Buffered",
            ObjectData::Mapped(_) => "Mapped",
        };
        f.debug_struct("ObjectData")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}

/// The core storage backend trait.
///
/// Paths are relative to the backend's root unless absolute. The trait is
/// object-safe and is shared as `Arc<dyn StorageBackend>`.
pub trait StorageBackend: Send + Sync {
    /// Checks if an object exists at the given path.
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Retrieves metadata for an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist or metadata cannot be read.
    fn metadata(&self, path: &Path) -> Result<ObjectMeta>;

    /// Reads a whole object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist or cannot be read.
    fn read(&self, path: &Path) -> Result<ObjectData>;

    /// Writes a whole object, replacing any previous contents.
    ///
    /// Parent directories are created as needed. Readers never observe a
    /// partially written object.
    fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Lists entry names directly under `prefix`, sorted.
    ///
    /// A missing prefix lists as empty.
    fn list(&self, prefix: &Path) -> Result<Vec<String>>;
}
