use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{GazemapError, GazemapResult};

type HmacSha256 = Hmac<Sha256>;

/// Binary content bucket, keyed by `{owner}/{analysis}/{kind}_{timestamp}`
/// paths. The seam the Artifact Cache is tested through; a production
/// deployment points this at an S3-compatible bucket, tests at a scratch
/// directory.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> GazemapResult<()>;

    async fn get(&self, key: &str) -> GazemapResult<Vec<u8>>;

    /// Time-limited retrieval URL for an existing object. `NotFound` if the
    /// backing object is gone.
    async fn presign_get(&self, key: &str, ttl: Duration) -> GazemapResult<String>;

    async fn delete(&self, key: &str) -> GazemapResult<()>;
}

/// Filesystem-backed object store.
///
/// Presigned URLs carry an expiry timestamp and an HMAC-SHA256 signature
/// over `key\nexpires`, the same shape an S3 presigner produces, so the
/// serving layer can verify them without consulting the store.
pub struct FsObjectStore {
    root: PathBuf,
    signing_key: Vec<u8>,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, signing_key: impl Into<Vec<u8>>) -> GazemapResult<Self> {
        let signing_key = signing_key.into();
        if signing_key.is_empty() {
            return Err(GazemapError::validation("signing key must be non-empty"));
        }
        Ok(Self {
            root: root.into(),
            signing_key,
        })
    }

    /// Root directory backing this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> GazemapResult<PathBuf> {
        Ok(self.root.join(normalize_key(key)?))
    }

    /// Signature for `key` valid until `expires` (unix seconds). Exposed so
    /// the presentation collaborator can verify URLs it is handed.
    pub fn sign(&self, key: &str, expires: i64) -> GazemapResult<String> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|_| GazemapError::storage("signing key rejected by HMAC"))?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> GazemapResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| GazemapError::storage(format!("create {}: {err}", parent.display())))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| GazemapError::storage(format!("write {}: {err}", path.display())))
    }

    async fn get(&self, key: &str) -> GazemapResult<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(GazemapError::not_found(format!("object '{key}'")))
            }
            Err(err) => Err(GazemapError::storage(format!(
                "read {}: {err}",
                path.display()
            ))),
        }
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> GazemapResult<String> {
        let path = self.path_for(key)?;
        if tokio::fs::metadata(&path).await.is_err() {
            return Err(GazemapError::not_found(format!("object '{key}'")));
        }

        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        let sig = self.sign(key, expires)?;
        Ok(format!(
            "file://{}?expires={expires}&sig={sig}",
            path.display()
        ))
    }

    async fn delete(&self, key: &str) -> GazemapResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(GazemapError::storage(format!(
                "delete {}: {err}",
                path.display()
            ))),
        }
    }
}

/// Validate a storage key: relative, `/`-separated, no empty or `..`
/// segments.
fn normalize_key(key: &str) -> GazemapResult<&str> {
    if key.is_empty() || key.starts_with('/') {
        return Err(GazemapError::validation(
            "storage keys must be non-empty relative paths",
        ));
    }
    for part in key.split('/') {
        if part.is_empty() || part == "." || part == ".." {
            return Err(GazemapError::validation(format!(
                "storage key '{key}' contains an invalid segment"
            )));
        }
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> FsObjectStore {
        FsObjectStore::new(dir.path(), "test-signing-key").unwrap()
    }

    #[test]
    fn keys_are_validated() {
        assert!(normalize_key("owner/analysis/raw_1.png").is_ok());
        assert!(normalize_key("/abs").is_err());
        assert!(normalize_key("a//b").is_err());
        assert!(normalize_key("a/../b").is_err());
        assert!(normalize_key("").is_err());
    }

    #[test]
    fn empty_signing_key_is_rejected() {
        assert!(FsObjectStore::new("/tmp/x", "").is_err());
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store
            .put("owner/analysis/raw_1.png", b"png bytes", "image/png")
            .await
            .unwrap();
        let back = store.get("owner/analysis/raw_1.png").await.unwrap();
        assert_eq!(back, b"png bytes");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(&dir).get("owner/analysis/raw_1.png").await.unwrap_err();
        assert!(matches!(err, GazemapError::NotFound(_)));
    }

    #[tokio::test]
    async fn presign_embeds_future_expiry_and_verifiable_signature() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let key = "owner/analysis/heatmap_1.png";
        store.put(key, b"bytes", "image/png").await.unwrap();

        let url = store
            .presign_get(key, Duration::from_secs(3600))
            .await
            .unwrap();

        let (_, query) = url.split_once('?').unwrap();
        let mut expires = None;
        let mut sig = None;
        for pair in query.split('&') {
            match pair.split_once('=').unwrap() {
                ("expires", v) => expires = Some(v.parse::<i64>().unwrap()),
                ("sig", v) => sig = Some(v.to_string()),
                _ => {}
            }
        }
        let expires = expires.unwrap();
        assert!(expires > Utc::now().timestamp() + 3000);
        assert_eq!(sig.unwrap(), store.sign(key, expires).unwrap());
    }

    #[tokio::test]
    async fn presign_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(&dir)
            .presign_get("owner/analysis/raw_1.png", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, GazemapError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.put("k/v/raw_1.png", b"x", "image/png").await.unwrap();
        store.delete("k/v/raw_1.png").await.unwrap();
        store.delete("k/v/raw_1.png").await.unwrap();
        assert!(store.get("k/v/raw_1.png").await.is_err());
    }
}
