use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::{
    db,
    encode::MIME_PNG,
    error::GazemapResult,
    model::{LayerArtifact, LayerKind, RasterDims},
    store::ObjectStore,
};

/// Owns `layer_artifacts` rows and their backing bytes.
///
/// Exactly one artifact of each kind exists per completed analysis; that
/// invariant lives here, not in the renderer. A repeated `save` of the same
/// `(analysis_id, kind)` returns the existing artifact, which makes the
/// concurrent background persist safe to retry.
#[derive(Clone)]
pub struct ArtifactCache {
    pool: SqlitePool,
    store: Arc<dyn ObjectStore>,
}

impl ArtifactCache {
    pub fn new(pool: SqlitePool, store: Arc<dyn ObjectStore>) -> Self {
        Self { pool, store }
    }

    /// Bucket key for one rendered variant.
    pub fn storage_key(
        owner_id: &str,
        analysis_id: &str,
        kind: LayerKind,
        created_at: DateTime<Utc>,
    ) -> String {
        format!(
            "{owner_id}/{analysis_id}/{kind}_{}.png",
            created_at.timestamp_millis()
        )
    }

    /// Upload one rendered variant and record its metadata row.
    ///
    /// Each save is independent: failure here must not roll back or block
    /// sibling kinds (the caller handles per-kind failure).
    pub async fn save(
        &self,
        analysis_id: &str,
        document_id: &str,
        owner_id: &str,
        kind: LayerKind,
        png_bytes: &[u8],
        dims: RasterDims,
    ) -> GazemapResult<LayerArtifact> {
        if let Some(existing) = self.get(analysis_id, kind).await? {
            tracing::debug!(analysis_id, %kind, "artifact already cached, reusing");
            return Ok(existing);
        }

        let created_at = Utc::now();
        let storage_key = Self::storage_key(owner_id, analysis_id, kind, created_at);
        self.store.put(&storage_key, png_bytes, MIME_PNG).await?;

        let result = sqlx::query(
            "INSERT INTO layer_artifacts \
             (analysis_id, document_id, owner_id, kind, storage_key, \
              width, height, byte_size, mime_type, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (analysis_id, kind) DO NOTHING",
        )
        .bind(analysis_id)
        .bind(document_id)
        .bind(owner_id)
        .bind(kind.as_str())
        .bind(&storage_key)
        .bind(i64::from(dims.width))
        .bind(i64::from(dims.height))
        .bind(db::to_i64(png_bytes.len() as u64)?)
        .bind(MIME_PNG)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Lost a save race; the winner's row is authoritative. Our
            // orphaned upload is removed best-effort.
            tracing::debug!(analysis_id, %kind, "lost artifact save race");
            if let Err(err) = self.store.delete(&storage_key).await {
                tracing::warn!(%err, %storage_key, "failed to remove orphaned upload");
            }
            if let Some(existing) = self.get(analysis_id, kind).await? {
                return Ok(existing);
            }
        }

        Ok(LayerArtifact {
            analysis_id: analysis_id.to_string(),
            document_id: document_id.to_string(),
            owner_id: owner_id.to_string(),
            kind,
            storage_key,
            width: dims.width,
            height: dims.height,
            byte_size: png_bytes.len() as u64,
            mime_type: MIME_PNG.to_string(),
            created_at,
        })
    }

    pub async fn get(
        &self,
        analysis_id: &str,
        kind: LayerKind,
    ) -> GazemapResult<Option<LayerArtifact>> {
        let row = sqlx::query(
            "SELECT analysis_id, document_id, owner_id, kind, storage_key, \
                    width, height, byte_size, mime_type, created_at \
             FROM layer_artifacts WHERE analysis_id = ? AND kind = ?",
        )
        .bind(analysis_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(artifact_from_row).transpose()
    }

    /// Whatever subset of the four kinds currently exists for an analysis.
    /// Callers must tolerate fewer than four and fall back to on-the-fly
    /// rendering for a missing kind.
    pub async fn get_all(&self, analysis_id: &str) -> GazemapResult<Vec<LayerArtifact>> {
        let rows = sqlx::query(
            "SELECT analysis_id, document_id, owner_id, kind, storage_key, \
                    width, height, byte_size, mime_type, created_at \
             FROM layer_artifacts WHERE analysis_id = ? ORDER BY kind",
        )
        .bind(analysis_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(artifact_from_row).collect()
    }

    /// Time-limited retrieval URL for a persisted artifact.
    pub async fn resolve_access(
        &self,
        artifact: &LayerArtifact,
        ttl: Duration,
    ) -> GazemapResult<String> {
        self.store.presign_get(&artifact.storage_key, ttl).await
    }

    /// Cascading lifecycle hook: artifacts die with their analysis.
    pub async fn delete_for_analysis(&self, analysis_id: &str) -> GazemapResult<()> {
        let artifacts = self.get_all(analysis_id).await?;
        for artifact in &artifacts {
            self.store.delete(&artifact.storage_key).await?;
        }
        sqlx::query("DELETE FROM layer_artifacts WHERE analysis_id = ?")
            .bind(analysis_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn artifact_from_row(row: SqliteRow) -> GazemapResult<LayerArtifact> {
    Ok(LayerArtifact {
        analysis_id: row.try_get("analysis_id")?,
        document_id: row.try_get("document_id")?,
        owner_id: row.try_get("owner_id")?,
        kind: LayerKind::parse(row.try_get::<String, _>("kind")?.as_str())?,
        storage_key: row.try_get("storage_key")?,
        width: row.try_get::<i64, _>("width")? as u32,
        height: row.try_get::<i64, _>("height")? as u32,
        byte_size: db::to_u64(row.try_get::<i64, _>("byte_size")?)?,
        mime_type: row.try_get("mime_type")?,
        created_at: db::parse_datetime(&row.try_get::<String, _>("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsObjectStore;

    async fn cache(dir: &tempfile::TempDir) -> ArtifactCache {
        let pool = db::connect(&dir.path().join("meta.sqlite")).await.unwrap();
        let store = FsObjectStore::new(dir.path().join("bucket"), "test-key").unwrap();
        ArtifactCache::new(pool, Arc::new(store))
    }

    fn dims() -> RasterDims {
        RasterDims {
            width: 8,
            height: 8,
        }
    }

    #[tokio::test]
    async fn save_then_get_all_returns_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir).await;

        let artifact = cache
            .save("an-1", "doc-1", "owner-1", LayerKind::Heatmap, b"png", dims())
            .await
            .unwrap();
        assert_eq!(artifact.kind, LayerKind::Heatmap);
        assert_eq!(artifact.byte_size, 3);
        assert_eq!(artifact.mime_type, "image/png");

        let all = cache.get_all("an-1").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], artifact);

        assert!(cache.get_all("an-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_save_of_same_kind_reuses_the_existing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir).await;

        let first = cache
            .save("an-1", "doc-1", "owner-1", LayerKind::Raw, b"first", dims())
            .await
            .unwrap();
        let second = cache
            .save("an-1", "doc-1", "owner-1", LayerKind::Raw, b"second", dims())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.get_all("an-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_access_requires_a_live_object() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir).await;

        let artifact = cache
            .save("an-1", "doc-1", "owner-1", LayerKind::Combined, b"png", dims())
            .await
            .unwrap();

        let url = cache
            .resolve_access(&artifact, Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(url.contains("expires="));
        assert!(url.contains(&artifact.storage_key));

        cache.delete_for_analysis("an-1").await.unwrap();
        let err = cache
            .resolve_access(&artifact, Duration::from_secs(3600))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::GazemapError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_for_analysis_cascades_rows_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir).await;

        for kind in LayerKind::ALL {
            cache
                .save("an-1", "doc-1", "owner-1", kind, b"png", dims())
                .await
                .unwrap();
        }
        assert_eq!(cache.get_all("an-1").await.unwrap().len(), 4);

        cache.delete_for_analysis("an-1").await.unwrap();
        assert!(cache.get_all("an-1").await.unwrap().is_empty());
    }
}
