use base64::Engine as _;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use crate::{
    db,
    error::{GazemapError, GazemapResult},
    model::AnalysisRef,
};

/// Lowercase hex SHA-256 digest of raw document bytes.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Recover raw document bytes from a text-safe payload.
///
/// Accepts either a bare base64 string or a full `data:` URL. The hash must
/// be computed over the decoded bytes: hashing the encoded text would make
/// the fingerprint encoding-dependent and break duplicate detection across
/// different encodings of the same content.
pub fn decode_document_data(data: &str) -> GazemapResult<Vec<u8>> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|err| GazemapError::validation(format!("document payload is not valid base64: {err}")))
}

/// Owns `content_fingerprints` rows: the dedupe key per owning user.
#[derive(Clone)]
pub struct FingerprintService {
    pool: SqlitePool,
}

impl FingerprintService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a prior analysis of identical content for this owner.
    pub async fn lookup(
        &self,
        owner_id: &str,
        content_hash: &str,
    ) -> GazemapResult<Option<AnalysisRef>> {
        let row = sqlx::query(
            "SELECT analysis_id, document_id FROM content_fingerprints \
             WHERE owner_id = ? AND content_hash = ?",
        )
        .bind(owner_id)
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(AnalysisRef {
                analysis_id: row.try_get("analysis_id")?,
                document_id: row.try_get("document_id")?,
            })),
            None => Ok(None),
        }
    }

    /// Record a fingerprint row atomically.
    ///
    /// The `(owner_id, content_hash)` unique index is the concurrency
    /// guarantee: a violation surfaces as `AlreadyExists`, which callers
    /// treat as a successful no-op (a concurrent duplicate submission is an
    /// expected race, not a bug). Never check-then-insert.
    pub async fn record(
        &self,
        owner_id: &str,
        document_id: &str,
        analysis_id: &str,
        content_hash: &str,
        byte_size: u64,
    ) -> GazemapResult<()> {
        let result = sqlx::query(
            "INSERT INTO content_fingerprints \
             (owner_id, document_id, analysis_id, content_hash, byte_size, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(owner_id)
        .bind(document_id)
        .bind(analysis_id)
        .bind(content_hash)
        .bind(db::to_i64(byte_size)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(GazemapError::already_exists(format!(
                    "fingerprint for owner {owner_id} with hash {content_hash}"
                )))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Cascading lifecycle hook: fingerprints die with their document.
    pub async fn delete_for_document(
        &self,
        owner_id: &str,
        document_id: &str,
    ) -> GazemapResult<()> {
        sqlx::query("DELETE FROM content_fingerprints WHERE owner_id = ? AND document_id = ?")
            .bind(owner_id)
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
