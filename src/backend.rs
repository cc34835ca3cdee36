//! Storage contract implemented by cache backends.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Write destination for one blob upload.
///
/// Writes accumulate in memory; nothing reaches the network until
/// [`finish`](BlobWriter::finish) runs the upload protocol. A writer is
/// consumed by `finish` and cannot be reused.
#[async_trait]
pub trait BlobWriter: Send + std::fmt::Debug {
    /// Appends bytes to the pending payload. Never suspends.
    fn write(&mut self, data: &[u8]);

    /// Transfers the payload to the service and closes the writer.
    ///
    /// # Errors
    ///
    /// Returns an error if any step of the upload protocol fails. The payload
    /// is discarded either way.
    async fn finish(self: Box<Self>) -> Result<()>;
}

/// Trait for remote cache storage backends.
///
/// The three operations here are the entire surface the surrounding system
/// depends on; backend selection happens elsewhere.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Fetches the blob stored under `key`.
    ///
    /// # Returns
    ///
    /// `Some(bytes)` on a hit, `None` on a miss.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures past miss detection, such as a
    /// resolved entry whose download fails. Misses are `Ok(None)`.
    async fn fetch(&self, key: &str) -> Result<Option<Bytes>>;

    /// Opens a write destination for the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service refuses the upload reservation; no
    /// writer is handed out that would fail later.
    async fn writer(&self, key: &str) -> Result<Box<dyn BlobWriter>>;

    /// Checks whether a blob exists under `key` without downloading it.
    ///
    /// # Errors
    ///
    /// Returns an error only for unexpected failures. Misses are `Ok(false)`.
    async fn exists(&self, key: &str) -> Result<bool>;
}
