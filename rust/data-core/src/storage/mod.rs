// rust/data-core/src/storage/mod.rs

//! Storage abstraction for dataset files.
//!
//! The catalog reads dataset metadata and shard files through the
//! [`StorageBackend`] trait, so datasets can live on any system that can
//! serve whole objects by path.
//!
//! # Example
//!
//! ```no_run
//! use data_core::config::StorageConfig;
//! use data_core::storage::{LocalStorage, StorageBackend};
//! use std::path::Path;
//!
//! let storage = LocalStorage::new(&StorageConfig::default()).unwrap();
//! storage.write(Path::new("example.txt"), b"Hello, world!").unwrap();
//!
//! let data = storage.read(Path::new("example.txt")).unwrap();
//! assert_eq!(&data[..], b"Hello, world!");
//! ```

mod local;
mod traits;

pub use local::LocalStorage;
pub use traits::{ObjectData, ObjectMeta, StorageBackend};
