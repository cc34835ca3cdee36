//! Storage backend for the GitHub Actions artifact cache service.
//!
//! Blobs are addressed by a logical key plus a version string. Lookups resolve
//! a key to a single-use download URL; stores run the service's
//! reserve → chunked-upload → finalize protocol. The [`CacheStorage`] trait is
//! the boundary the surrounding system drives this backend through.

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod key;
pub mod upload;

pub use backend::{BlobWriter, CacheStorage};
pub use client::{CacheClient, CacheEntry, CACHE_VERSION};
pub use config::CacheConfig;
pub use error::{Error, Result};
pub use key::CacheKey;
pub use upload::{UploadSink, CHUNK_SIZE};
