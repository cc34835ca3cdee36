//! HTTP client for the artifact cache protocol.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{BlobWriter, CacheStorage};
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::key::CacheKey;
use crate::upload::UploadSink;

/// Version string combined with caller keys to scope cache entries.
pub const CACHE_VERSION: &str = "gha-cache-v1";

/// `Accept` header pinning the service API version.
const API_ACCEPT: &str = "application/json;api-version=6.0-preview.1";

/// A resolved cache entry: where to download the blob.
///
/// The location is valid for a single subsequent fetch.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Key the service matched; may differ from the requested key on
    /// prefix matches.
    pub cache_key: Option<String>,
    /// Single-use download URL for the blob.
    pub archive_location: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    cache_key: Option<String>,
    archive_location: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReserveRequest<'a> {
    key: &'a str,
    version: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReserveResponse {
    cache_id: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FinalizeRequest {
    size: u64,
}

/// Client for the hosted artifact cache service.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct CacheClient {
    client: Client,
    base_url: String,
    token: String,
}

impl CacheClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Creates a client from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a required variable is unset or
    /// empty; no network call is attempted.
    pub fn from_env() -> Result<Self> {
        Self::new(&CacheConfig::from_env()?)
    }

    /// Gets the URL for a cache API resource.
    fn cache_url(&self, resource: &str) -> String {
        format!("{}/_apis/artifactcache/{}", self.base_url, resource)
    }

    /// Starts an API request with the pinned `Accept` header and bearer auth.
    /// The raw blob download carries neither.
    fn api_request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(ACCEPT, API_ACCEPT)
            .bearer_auth(&self.token)
    }

    /// Resolves a key to its download location.
    ///
    /// Any non-success status is a miss; the protocol does not distinguish an
    /// absent key from a service failure at this stage. A success response
    /// without a download location is also a miss.
    ///
    /// # Errors
    ///
    /// Returns an error only if a success response body cannot be parsed.
    pub async fn resolve_entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let url = self.cache_url("cache");
        let response = self
            .api_request(Method::GET, &url)
            .query(&[("keys", key.keys_csv().as_str()), ("version", key.version())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT || !status.is_success() {
            debug!(%status, "cache query missed");
            return Ok(None);
        }

        let entry: QueryResponse = response.json().await?;
        match entry.archive_location {
            Some(archive_location) => Ok(Some(CacheEntry {
                cache_key: entry.cache_key,
                archive_location,
            })),
            // The service can answer 200 with no location; treat it as a miss.
            None => Ok(None),
        }
    }

    /// Downloads the blob stored under `key`.
    ///
    /// # Returns
    ///
    /// `Some(bytes)` on a hit, `None` on a miss.
    ///
    /// # Errors
    ///
    /// Once an entry has resolved, a failing download is an error, never a
    /// miss.
    pub async fn fetch_blob(&self, key: &CacheKey) -> Result<Option<Bytes>> {
        let Some(entry) = self.resolve_entry(key).await? else {
            return Ok(None);
        };

        debug!("cache hit, downloading archive");
        let response = self.client.get(&entry.archive_location).send().await?;
        if !response.status().is_success() {
            return Err(service_error(response).await);
        }

        let data = response.bytes().await?;
        Ok(Some(data))
    }

    /// Checks whether an entry exists for `key` without downloading it.
    ///
    /// # Errors
    ///
    /// Misses are `Ok(false)`; any other failure surfaces to the caller.
    pub async fn entry_exists(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.resolve_entry(key).await?.is_some())
    }

    /// Reserves an upload session for `key`, returning its session id.
    pub(crate) async fn reserve(&self, key: &CacheKey) -> Result<i64> {
        let url = self.cache_url("caches");
        let request = ReserveRequest {
            key: key.primary(),
            version: key.version(),
        };

        let response = self
            .api_request(Method::POST, &url)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(service_error(response).await);
        }

        let reserved: ReserveResponse = response.json().await?;
        debug!(session = reserved.cache_id, "reserved upload session");
        Ok(reserved.cache_id)
    }

    /// Uploads one byte range of a reserved session.
    ///
    /// `start` is the chunk's offset into the payload and `total` the full
    /// payload length; the range end in `Content-Range` is inclusive.
    pub(crate) async fn upload_chunk(
        &self,
        session: i64,
        chunk: Vec<u8>,
        start: u64,
        total: u64,
    ) -> Result<()> {
        let url = self.cache_url(&format!("caches/{}", session));
        let end = start + chunk.len() as u64 - 1;
        let content_range = format!("bytes {}-{}/{}", start, end, total);
        debug!(session, %content_range, "uploading chunk");

        let response = self
            .api_request(Method::PATCH, &url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_RANGE, content_range)
            .body(chunk)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(service_error(response).await);
        }

        Ok(())
    }

    /// Finalizes a session, declaring the total payload size.
    pub(crate) async fn finalize(&self, session: i64, size: u64) -> Result<()> {
        let url = self.cache_url(&format!("caches/{}", session));
        let response = self
            .api_request(Method::POST, &url)
            .json(&FinalizeRequest { size })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(service_error(response).await);
        }

        debug!(session, size, "finalized cache upload");
        Ok(())
    }

    fn storage_key(&self, key: &str) -> Result<CacheKey> {
        CacheKey::new([key], CACHE_VERSION)
    }
}

/// Drains a non-success response into a service error, body text included.
async fn service_error(response: reqwest::Response) -> Error {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();
    Error::Service { status, message }
}

#[async_trait]
impl CacheStorage for CacheClient {
    async fn fetch(&self, key: &str) -> Result<Option<Bytes>> {
        self.fetch_blob(&self.storage_key(key)?).await
    }

    async fn writer(&self, key: &str) -> Result<Box<dyn BlobWriter>> {
        let sink = UploadSink::open(self.clone(), self.storage_key(key)?).await?;
        Ok(Box::new(sink))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.entry_exists(&self.storage_key(key)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_url_joins_base_and_resource() {
        let config = CacheConfig::new("https://cache.example.com/", "token");
        let client = CacheClient::new(&config).unwrap();

        assert_eq!(
            client.cache_url("cache"),
            "https://cache.example.com/_apis/artifactcache/cache"
        );
        assert_eq!(
            client.cache_url("caches/42"),
            "https://cache.example.com/_apis/artifactcache/caches/42"
        );
    }

    #[test]
    fn storage_key_uses_fixed_version() {
        let config = CacheConfig::new("https://cache.example.com", "token");
        let client = CacheClient::new(&config).unwrap();

        let key = client.storage_key("artifacts/app.tar").unwrap();
        assert_eq!(key.primary(), "artifacts/app.tar");
        assert_eq!(key.version(), CACHE_VERSION);
    }
}
