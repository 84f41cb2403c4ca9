use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GazemapError, GazemapResult};

#[derive(Debug, Clone, serde::Deserialize)]
pub struct GazemapConfig {
    /// Metadata database path.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Root directory of the filesystem object store.
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Lifetime of presigned retrieval URLs, in seconds.
    #[serde(default = "default_presign_ttl_secs")]
    pub presign_ttl_secs: u64,

    /// Per-layer upload timeout, in seconds.
    #[serde(default = "default_save_timeout_secs")]
    pub save_timeout_secs: u64,

    /// HMAC key for presigned-URL signatures.
    #[serde(default = "default_signing_key")]
    pub signing_key: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("gazemap.sqlite")
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("gazemap-store")
}

fn default_presign_ttl_secs() -> u64 {
    3600
}

fn default_save_timeout_secs() -> u64 {
    30
}

fn default_signing_key() -> String {
    "gazemap-local-signing-key".to_string()
}

impl Default for GazemapConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            storage_root: default_storage_root(),
            presign_ttl_secs: default_presign_ttl_secs(),
            save_timeout_secs: default_save_timeout_secs(),
            signing_key: default_signing_key(),
        }
    }
}

impl GazemapConfig {
    pub fn load(path: &Path) -> GazemapResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            GazemapError::validation(format!("read config {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> GazemapResult<Self> {
        toml::from_str(text)
            .map_err(|err| GazemapError::validation(format!("parse config: {err}")))
    }

    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.presign_ttl_secs)
    }

    pub fn save_timeout(&self) -> Duration {
        Duration::from_secs(self.save_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = GazemapConfig::from_toml_str("").unwrap();
        assert_eq!(config.presign_ttl_secs, 3600);
        assert_eq!(config.save_timeout_secs, 30);
        assert_eq!(config.db_path, PathBuf::from("gazemap.sqlite"));
    }

    #[test]
    fn fields_override_defaults() {
        let config = GazemapConfig::from_toml_str(
            r#"
            db_path = "/var/lib/gazemap/meta.sqlite"
            presign_ttl_secs = 900
            "#,
        )
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/gazemap/meta.sqlite"));
        assert_eq!(config.presign_ttl(), Duration::from_secs(900));
        assert_eq!(config.save_timeout_secs, 30);
    }

    #[test]
    fn malformed_toml_is_a_validation_error() {
        assert!(GazemapConfig::from_toml_str("db_path = [").is_err());
    }
}
