#![forbid(unsafe_code)]

//! Deterministic visual-attention layer synthesis for document images,
//! paired with a content-addressable artifact cache.
//!
//! The rendering core (`normalize` → `density` → `colormap` / `regions` →
//! `composite`) is pure, synchronous CPU work over explicit RGBA buffers;
//! everything async lives above it in `fingerprint`, `cache`, and
//! `pipeline`.

pub mod cache;
pub mod colormap;
pub mod composite;
pub mod config;
pub mod db;
pub mod density;
pub mod encode;
pub mod error;
pub mod fingerprint;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod regions;
pub mod store;
pub mod surface;

pub use cache::ArtifactCache;
pub use composite::{BlendOp, LayerSet, HEATMAP_OPACITY};
pub use config::GazemapConfig;
pub use error::{GazemapError, GazemapResult};
pub use fingerprint::{decode_document_data, fingerprint_bytes, FingerprintService};
pub use model::{
    annotations_from_json, AnalysisRef, AnnotationSet, AttentionPoint, ContentFingerprint,
    LayerArtifact, LayerKind, RasterDims, RegionAnnotation, SkillCategory,
};
pub use pipeline::{
    persist_layer_set, render_layer_set, PersistReport, SubmitOutcome, SynthesisService,
};
pub use store::{FsObjectStore, ObjectStore};
pub use surface::Surface;
