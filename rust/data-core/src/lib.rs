// rust/data-core/src/lib.rs

//! Data-loading core for text-to-text preprocessing pipelines.
//!
//! This crate provides deterministic per-stage seeding, memoized dataset
//! builders with split resolution, and the file-backed catalog and storage
//! they read through.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod loader;
pub mod paths;
pub mod records;
pub mod runtime;
pub mod seed;
pub mod shuffle;
pub mod stage;
pub mod storage;

// Re-export commonly used types for convenience
pub use cache::{ResourceCache, ResourceKey};
pub use catalog::{
    Catalog, DatasetBuilder, DatasetInfo, DatasetName, DatasetSize, DatasetWriter,
    FileInstruction, LocalCatalog,
};
pub use config::DataConfig;
pub use error::{DataError, Result};
pub use loader::{BuilderCache, LazyLoader};
pub use paths::GlobalCacheDirs;
pub use records::{LengthPrefixedFormat, NewlineDelimitedFormat, RecordFormat};
pub use runtime::DataRuntime;
pub use seed::{ScopeGuard, Seed, SeedSequencer};
pub use shuffle::stateless_shuffle;
pub use stage::MapStage;
pub use storage::{LocalStorage, ObjectData, StorageBackend};
