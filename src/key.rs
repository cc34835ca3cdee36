//! Cache key model for the artifact cache protocol.

use crate::error::{Error, Result};

/// Maximum length of a single key segment accepted by the service.
const MAX_KEY_LEN: usize = 512;

/// Identifies a storable artifact: ordered key segments plus a version string.
///
/// Lookups send every segment; reservations use the primary (first) segment.
/// Matching and uniqueness are enforced server-side per (keys, version) tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    keys: Vec<String>,
    version: String,
}

impl CacheKey {
    /// Creates a validated cache key.
    ///
    /// # Errors
    ///
    /// Returns an error if no segment is given, or if any segment is empty,
    /// longer than 512 characters, or contains a comma (commas would corrupt
    /// the comma-separated query parameter).
    pub fn new<I, S>(keys: I, version: impl Into<String>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(Error::InvalidKey(
                "at least one key segment is required".to_string(),
            ));
        }
        for key in &keys {
            check_segment(key)?;
        }

        Ok(Self {
            keys,
            version: version.into(),
        })
    }

    /// Key segments in lookup order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Primary segment, used when reserving an upload session.
    pub fn primary(&self) -> &str {
        &self.keys[0]
    }

    /// Version string scoping this key.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Segments joined for the `keys` query parameter.
    pub fn keys_csv(&self) -> String {
        self.keys.join(",")
    }
}

fn check_segment(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key segment is empty".to_string()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(Error::InvalidKey(format!(
            "key segment exceeds {} characters: {}",
            MAX_KEY_LEN, key
        )));
    }
    if key.contains(',') {
        return Err(Error::InvalidKey(format!(
            "key segment contains a comma: {}",
            key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_segments_for_query() {
        let key = CacheKey::new(["linux-build-abc", "linux-build-"], "v1").unwrap();
        assert_eq!(key.keys_csv(), "linux-build-abc,linux-build-");
        assert_eq!(key.primary(), "linux-build-abc");
        assert_eq!(key.version(), "v1");
    }

    #[test]
    fn rejects_empty_key_list() {
        let keys: [&str; 0] = [];
        assert!(matches!(
            CacheKey::new(keys, "v1"),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn rejects_invalid_segments() {
        assert!(CacheKey::new([""], "v1").is_err());
        assert!(CacheKey::new(["a,b"], "v1").is_err());
        assert!(CacheKey::new(["x".repeat(513)], "v1").is_err());
        assert!(CacheKey::new(["x".repeat(512)], "v1").is_ok());
    }
}
