//! Directory-scoped persistent backend.
//!
//! One file per key inside a directory the cache owns exclusively. File
//! names are the urlencoded key (reversible, so keys stay enumerable) plus a
//! fixed suffix. Each file starts with an 8-byte little-endian unix expiry
//! second (0 = no expiry) followed by the payload bytes.
//!
//! Writes go through a temp-sibling + rename protocol, so a reader never
//! observes a partially written entry and concurrent writers to one key
//! resolve to a single complete file.

use crate::cache::CacheBackend;
use crate::error::Error;
use crate::serialize::Payload;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const ENTRY_SUFFIX: &str = ".cache";
const EXPIRY_HEADER_LEN: usize = 8;

pub struct DiskBackend {
    dir: PathBuf,
}

impl DiskBackend {
    /// Creates the backend, ensuring its directory exists.
    ///
    /// # Errors
    ///
    /// Returns a cache error if the directory cannot be created.
    pub fn new(dir: PathBuf) -> Result<Self, Error> {
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::cache_failed(format!("failed to create cache directory: {e}")))?;
        Ok(Self { dir })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}{ENTRY_SUFFIX}", urlencoding::encode(key)))
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs())
    }
}

/// Writes `data` to `path` via a temp sibling in the same directory, then
/// renames it into place. Same-filesystem rename keeps the swap atomic.
async fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map_or_else(|| "entry".to_string(), |n| n.to_string_lossy().to_string());
    let temp_path = path.with_file_name(format!(".{file_name}.{:016x}.tmp", fastrand::u64(..)));

    tokio::fs::write(&temp_path, data).await?;
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl CacheBackend for DiskBackend {
    async fn get(&self, key: &str) -> Result<Option<Payload>, Error> {
        let path = self.entry_path(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::cache_failed(format!("failed to read cache entry: {e}"))),
        };

        if raw.len() < EXPIRY_HEADER_LEN {
            // Truncated entry, drop it
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }

        let mut header = [0u8; EXPIRY_HEADER_LEN];
        header.copy_from_slice(&raw[..EXPIRY_HEADER_LEN]);
        let expires_at = u64::from_le_bytes(header);
        if expires_at != 0 && Self::now_secs() > expires_at {
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }

        Ok(Some(Payload::Bytes(raw[EXPIRY_HEADER_LEN..].to_vec())))
    }

    async fn set(&self, key: &str, value: Payload, ttl: Option<Duration>) -> Result<(), Error> {
        let Payload::Bytes(bytes) = value else {
            return Err(Error::cache_failed(
                "disk backend requires encoded byte payloads",
            ));
        };

        let expires_at = ttl.map_or(0, |ttl| Self::now_secs().saturating_add(ttl.as_secs()));
        let mut contents = Vec::with_capacity(EXPIRY_HEADER_LEN + bytes.len());
        contents.extend_from_slice(&expires_at.to_le_bytes());
        contents.extend_from_slice(&bytes);

        atomic_write(&self.entry_path(key), &contents)
            .await
            .map_err(|e| Error::cache_failed(format!("failed to write cache entry: {e}")))
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::cache_failed(format!(
                "failed to delete cache entry: {e}"
            ))),
        }
    }

    async fn has(&self, key: &str) -> Result<bool, Error> {
        // Route through get so expiry is honored
        Ok(self.get(key).await?.is_some())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| Error::cache_failed(format!("failed to read cache directory: {e}")))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::cache_failed(format!("failed to read cache directory: {e}")))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(encoded) = name.strip_suffix(ENTRY_SUFFIX) {
                if let Ok(key) = urlencoding::decode(encoded) {
                    keys.push(key.into_owned());
                }
            }
        }
        Ok(keys)
    }

    async fn clear(&self) -> Result<(), Error> {
        let keys = self.keys().await?;
        for key in keys {
            self.delete(&key).await?;
        }
        Ok(())
    }

    fn backend_id(&self) -> &'static str {
        "disk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> (DiskBackend, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let backend = DiskBackend::new(dir.path().join("origin")).unwrap();
        (backend, dir)
    }

    fn payload(data: &[u8]) -> Payload {
        Payload::Bytes(data.to_vec())
    }

    #[tokio::test]
    async fn set_then_get_round_trips_bytes() {
        let (backend, _dir) = backend();
        backend.set("k", payload(b"hello"), None).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(payload(b"hello")));
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("origin");
        {
            let backend = DiskBackend::new(path.clone()).unwrap();
            backend.set("k", payload(b"persisted"), None).await.unwrap();
        }
        let reopened = DiskBackend::new(path).unwrap();
        assert_eq!(
            reopened.get("k").await.unwrap(),
            Some(payload(b"persisted"))
        );
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let (backend, _dir) = backend();
        backend
            .set("k", payload(b"short-lived"), Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert!(backend.has("k").await.unwrap());

        // Rewrite the entry with an expiry in the past
        let path = backend.entry_path("k");
        let mut contents = 1u64.to_le_bytes().to_vec();
        contents.extend_from_slice(b"short-lived");
        std::fs::write(&path, contents).unwrap();

        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(!path.exists(), "expired entry should be removed");
    }

    #[tokio::test]
    async fn keys_round_trip_through_encoding() {
        let (backend, _dir) = backend();
        backend
            .set("abc123::headers", payload(b"v"), None)
            .await
            .unwrap();
        backend.set("plain", payload(b"v"), None).await.unwrap();

        let mut keys = backend.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["abc123::headers", "plain"]);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (backend, _dir) = backend();
        backend.set("k", payload(b"v"), None).await.unwrap();
        backend.delete("k").await.unwrap();
        backend.delete("k").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_removes_all_entries() {
        let (backend, _dir) = backend();
        backend.set("a", payload(b"1"), None).await.unwrap();
        backend.set("b", payload(b"2"), None).await.unwrap();
        backend.clear().await.unwrap();
        assert!(backend.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn inline_payloads_are_rejected() {
        let (backend, _dir) = backend();
        let result = backend
            .set("k", Payload::Inline(serde_json::json!(1)), None)
            .await;
        assert!(result.is_err());
    }
}
