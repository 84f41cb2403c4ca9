use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};

use crate::{
    cache::ArtifactCache,
    colormap, composite, density, encode,
    error::GazemapResult,
    fingerprint::{fingerprint_bytes, FingerprintService},
    model::{AnalysisRef, AttentionPoint, LayerKind, RasterDims, RegionAnnotation},
    normalize, regions,
};

pub use crate::composite::LayerSet;

/// Render the four canonical layer variants from an encoded base image and
/// live annotations.
///
/// Pure and synchronous: byte-identical output for identical inputs. Also
/// the on-the-fly fallback when a cached kind is missing.
pub fn render_layer_set(
    base_image: &[u8],
    points: &[AttentionPoint],
    region_annotations: &[RegionAnnotation],
) -> GazemapResult<(LayerSet, RasterDims)> {
    let base = encode::decode_base_image(base_image)?;
    let dims = base.dims();

    let (field_points, pixel_regions) = normalize::normalize(points, region_annotations, dims);

    let field = density::accumulate(&field_points, dims)?;
    let heatmap_layer = colormap::colorize(&field)?;
    let region_layer = regions::render_regions(&pixel_regions, dims)?;

    let set = composite::compose_layer_set(&base, &heatmap_layer, &region_layer)?;
    Ok((set, dims))
}

/// Outcome of a document submission.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Identical content already analyzed for this owner; the whole pipeline
    /// is skipped and the prior analysis is referenced instead.
    Duplicate { existing: AnalysisRef },
    /// New content. Layer synthesis and persistence continue on the
    /// background task behind `persist`; the ids are usable immediately.
    Accepted {
        analysis_id: String,
        document_id: String,
        persist: JoinHandle<PersistReport>,
    },
}

/// Per-kind result of the background persistence pass. Failures here never
/// fail the analysis: visual layers are an enhancement, not a precondition
/// of a usable result.
#[derive(Debug, Default)]
pub struct PersistReport {
    pub saved: Vec<crate::model::LayerArtifact>,
    pub failed: Vec<(LayerKind, String)>,
}

impl PersistReport {
    pub fn saved_kind(&self, kind: LayerKind) -> bool {
        self.saved.iter().any(|a| a.kind == kind)
    }
}

/// Orchestrates dedupe, rendering, and background persistence.
#[derive(Clone)]
pub struct SynthesisService {
    fingerprints: FingerprintService,
    cache: ArtifactCache,
    save_timeout: Duration,
}

impl SynthesisService {
    pub fn new(
        fingerprints: FingerprintService,
        cache: ArtifactCache,
        save_timeout: Duration,
    ) -> Self {
        Self {
            fingerprints,
            cache,
            save_timeout,
        }
    }

    /// Composition root: the full service stack from configuration, backed
    /// by SQLite metadata and a filesystem object store.
    pub async fn from_config(config: &crate::config::GazemapConfig) -> GazemapResult<Self> {
        let pool = crate::db::connect(&config.db_path).await?;
        let store = crate::store::FsObjectStore::new(
            config.storage_root.clone(),
            config.signing_key.clone(),
        )?;
        let cache = ArtifactCache::new(pool.clone(), std::sync::Arc::new(store));
        let fingerprints = FingerprintService::new(pool);
        Ok(Self::new(fingerprints, cache, config.save_timeout()))
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    pub fn fingerprints(&self) -> &FingerprintService {
        &self.fingerprints
    }

    /// Submit a document with its annotations.
    ///
    /// The fingerprint lookup runs before anything expensive; a hit
    /// short-circuits the entire pipeline. On a miss the fingerprint row is
    /// recorded atomically and synthesis moves to a background task whose
    /// failure is invisible to this caller; it always runs to completion or
    /// failure, silently.
    #[tracing::instrument(skip(self, document_bytes, points, region_annotations))]
    pub async fn submit(
        &self,
        owner_id: &str,
        document_bytes: Vec<u8>,
        points: Vec<AttentionPoint>,
        region_annotations: Vec<RegionAnnotation>,
    ) -> GazemapResult<SubmitOutcome> {
        let content_hash = fingerprint_bytes(&document_bytes);

        if let Some(existing) = self.fingerprints.lookup(owner_id, &content_hash).await? {
            tracing::debug!(owner_id, %content_hash, "duplicate submission, skipping analysis");
            return Ok(SubmitOutcome::Duplicate { existing });
        }

        let document_id = uuid::Uuid::new_v4().to_string();
        let analysis_id = uuid::Uuid::new_v4().to_string();

        match self
            .fingerprints
            .record(
                owner_id,
                &document_id,
                &analysis_id,
                &content_hash,
                document_bytes.len() as u64,
            )
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_already_exists() => {
                // A concurrent submission won the insert race; surface the
                // winner as the duplicate.
                if let Some(existing) = self.fingerprints.lookup(owner_id, &content_hash).await? {
                    return Ok(SubmitOutcome::Duplicate { existing });
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        }

        let cache = self.cache.clone();
        let save_timeout = self.save_timeout;
        let owner = owner_id.to_string();
        let task_analysis_id = analysis_id.clone();
        let task_document_id = document_id.clone();

        let persist = tokio::spawn(async move {
            match render_layer_set(&document_bytes, &points, &region_annotations) {
                Ok((set, dims)) => {
                    persist_layer_set(
                        &cache,
                        &task_analysis_id,
                        &task_document_id,
                        &owner,
                        &set,
                        dims,
                        save_timeout,
                    )
                    .await
                }
                Err(err) => {
                    tracing::warn!(%err, analysis_id = %task_analysis_id, "layer synthesis failed");
                    PersistReport {
                        saved: Vec::new(),
                        failed: LayerKind::ALL
                            .iter()
                            .map(|&kind| (kind, err.to_string()))
                            .collect(),
                    }
                }
            }
        });

        Ok(SubmitOutcome::Accepted {
            analysis_id,
            document_id,
            persist,
        })
    }
}

/// Persist all four variants concurrently.
///
/// Each save carries its own bounded timeout; a stuck upload neither blocks
/// nor cancels its siblings, and a failed kind is logged and skipped while
/// the rest proceed.
#[tracing::instrument(skip(cache, set))]
pub async fn persist_layer_set(
    cache: &ArtifactCache,
    analysis_id: &str,
    document_id: &str,
    owner_id: &str,
    set: &LayerSet,
    dims: RasterDims,
    save_timeout: Duration,
) -> PersistReport {
    let mut report = PersistReport::default();
    let mut tasks = JoinSet::new();

    for kind in LayerKind::ALL {
        let png = match encode::encode_png(set.get(kind)) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(%err, %kind, "layer encode failed");
                report.failed.push((kind, err.to_string()));
                continue;
            }
        };

        let cache = cache.clone();
        let analysis_id = analysis_id.to_string();
        let document_id = document_id.to_string();
        let owner_id = owner_id.to_string();
        tasks.spawn(async move {
            let result = tokio::time::timeout(
                save_timeout,
                cache.save(&analysis_id, &document_id, &owner_id, kind, &png, dims),
            )
            .await;
            (kind, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(Ok(artifact)))) => report.saved.push(artifact),
            Ok((kind, Ok(Err(err)))) => {
                tracing::warn!(%err, %kind, "layer save failed");
                report.failed.push((kind, err.to_string()));
            }
            Ok((kind, Err(_elapsed))) => {
                tracing::warn!(%kind, "layer save timed out");
                report.failed.push((kind, "save timed out".to_string()));
            }
            Err(join_err) => {
                tracing::warn!(%join_err, "layer save task aborted");
            }
        }
    }

    report.saved.sort_by_key(|a| a.kind.as_str());
    report.failed.sort_by_key(|(kind, _)| kind.as_str());
    report
}
