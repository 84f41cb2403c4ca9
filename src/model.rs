use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{GazemapError, GazemapResult};

/// One predicted focus-of-attention sample in document-relative coordinates.
///
/// `x`/`y` are percentages of the raster in `[0,100]`, `weight` is in `[0,1]`.
/// Produced by the upstream analysis model; out-of-range values are clamped
/// during normalization, never rejected.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AttentionPoint {
    pub x: f32,
    pub y: f32,
    pub weight: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillCategory {
    Hard,
    Soft,
    Impact,
    Education,
}

/// Axis-aligned labeled rectangle marking a semantic zone, in percent space.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegionAnnotation {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub category: SkillCategory,
    pub label: String,
}

/// Pixel dimensions of the decoded base raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RasterDims {
    pub width: u32,
    pub height: u32,
}

impl RasterDims {
    pub fn new(width: u32, height: u32) -> GazemapResult<Self> {
        let dims = Self { width, height };
        dims.validate()?;
        Ok(dims)
    }

    pub fn validate(&self) -> GazemapResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(GazemapError::validation(
                "raster width/height must be > 0",
            ));
        }
        Ok(())
    }

    pub fn pixel_count(&self) -> GazemapResult<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .ok_or_else(|| GazemapError::validation("raster pixel count overflow"))
    }

    /// Buffer length of a tightly packed RGBA8 raster of these dimensions.
    pub fn rgba8_len(&self) -> GazemapResult<usize> {
        self.pixel_count()?
            .checked_mul(4)
            .ok_or_else(|| GazemapError::validation("raster buffer size overflow"))
    }
}

/// The four canonical rendered variants of an analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Raw,
    Heatmap,
    Regions,
    Combined,
}

impl LayerKind {
    pub const ALL: [LayerKind; 4] = [
        LayerKind::Raw,
        LayerKind::Heatmap,
        LayerKind::Regions,
        LayerKind::Combined,
    ];

    /// Stable name used in storage keys and metadata rows.
    pub fn as_str(self) -> &'static str {
        match self {
            LayerKind::Raw => "raw",
            LayerKind::Heatmap => "heatmap",
            LayerKind::Regions => "regions",
            LayerKind::Combined => "combined",
        }
    }

    pub fn parse(s: &str) -> GazemapResult<Self> {
        match s {
            "raw" => Ok(LayerKind::Raw),
            "heatmap" => Ok(LayerKind::Heatmap),
            "regions" => Ok(LayerKind::Regions),
            "combined" => Ok(LayerKind::Combined),
            other => Err(GazemapError::validation(format!(
                "unknown layer kind '{other}'"
            ))),
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted rendered layer, addressable by `(analysis_id, kind)`.
///
/// Created once by the rendering pipeline, never mutated, deleted only when
/// the owning analysis is deleted.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayerArtifact {
    pub analysis_id: String,
    pub document_id: String,
    pub owner_id: String,
    pub kind: LayerKind,
    pub storage_key: String,
    pub width: u32,
    pub height: u32,
    pub byte_size: u64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

/// Dedupe row: at most one per `(owner_id, content_hash)` pair.
///
/// `content_hash` is the lowercase hex SHA-256 digest of the raw document
/// bytes. The row carries `analysis_id` so a lookup hit can address the
/// cached artifacts of the prior analysis directly.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ContentFingerprint {
    pub owner_id: String,
    pub document_id: String,
    pub analysis_id: String,
    pub content_hash: String,
    pub byte_size: u64,
    pub created_at: DateTime<Utc>,
}

/// Reference to a previously completed analysis, returned on a dedupe hit.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisRef {
    pub analysis_id: String,
    pub document_id: String,
}

/// Annotation payload as delivered by the upstream analysis collaborator.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnnotationSet {
    #[serde(default)]
    pub points: Vec<AttentionPoint>,
    #[serde(default)]
    pub regions: Vec<RegionAnnotation>,
}

pub fn annotations_from_json(payload: &str) -> GazemapResult<AnnotationSet> {
    serde_json::from_str(payload)
        .map_err(|err| GazemapError::validation(format!("malformed annotation payload: {err}")))
}
