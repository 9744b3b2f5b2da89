//! Mirra store: the concurrency-safe index over persisted identity
//! mappings, plus the reference-counting garbage collector.

#![forbid(unsafe_code)]

mod backend;
mod store;

pub use backend::{Backend, MappingRecord, MemoryBackend};
pub use store::Store;
