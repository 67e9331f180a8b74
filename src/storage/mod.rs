//! Storage module for JSEDB.
//!
//! The database only ever reads or replaces its file as one unit, so a store
//! exposes whole-file primitives and nothing else.

pub mod backend;
pub mod fs;
pub mod memory;

pub use backend::FileStore;
pub use fs::FsStore;
pub use memory::MemoryStore;
