//! Persistence for ramp run results.
//!
//! A [`RunStore`] maps run names to serialized run results. Three backends
//! are provided: process memory, a local directory of JSON files, and a local
//! directory mirrored to S3.

pub mod local;
pub mod memory;
pub mod mirrored;
pub mod object_store;
pub mod store;

pub use local::{LocalRunStore, RUN_FILE_EXTENSION};
pub use memory::MemoryRunStore;
pub use mirrored::MirroredRunStore;
pub use object_store::{ObjectStore, S3Config, S3ObjectStore};
pub use store::{open_store, RunStore, StoreBackend};
