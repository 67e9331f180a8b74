//! File store trait definition.

use async_trait::async_trait;
use std::fmt::Debug;
use std::io;
use std::path::Path;

/// Whole-file primitives the database is built on.
///
/// Stores are opaque byte holders: they never interpret the JSON they keep.
/// Every call may suspend, which is where concurrent operations interleave.
///
/// # Implementors
///
/// - [`super::FsStore`] - tokio filesystem
/// - [`super::MemoryStore`] - for testing and ephemeral databases
#[async_trait]
pub trait FileStore: Send + Sync + Debug {
    /// Read the whole file.
    ///
    /// A missing file is reported as [`io::ErrorKind::NotFound`].
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace the whole file, creating it if needed.
    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Check whether the file exists.
    async fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Remove the file.
    async fn delete(&self, path: &Path) -> io::Result<()>;
}
