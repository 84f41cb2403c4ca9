use crate::{
    error::{GazemapError, GazemapResult},
    model::LayerKind,
    surface::{multiply_in_place, over_in_place, Surface},
};

/// Global opacity applied when drawing the heatmap layer onto the base.
pub const HEATMAP_OPACITY: f32 = 0.7;

/// Blend mode for a single compositing call. Always an explicit parameter,
/// never ambient canvas state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BlendOp {
    SourceOver { opacity: f32 },
    Multiply,
}

/// Composite `src` onto `dst` with the given blend op. Both surfaces must
/// share dimensions.
pub fn composite_in_place(dst: &mut Surface, src: &Surface, op: BlendOp) -> GazemapResult<()> {
    if dst.dims() != src.dims() {
        return Err(GazemapError::render(
            "composite requires matching surface dimensions",
        ));
    }
    match op {
        BlendOp::SourceOver { opacity } => over_in_place(dst.as_mut_slice(), src.as_slice(), opacity),
        BlendOp::Multiply => multiply_in_place(dst.as_mut_slice(), src.as_slice()),
    }
}

/// The four canonical rendered variants of one analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerSet {
    pub raw: Surface,
    pub heatmap: Surface,
    pub regions: Surface,
    pub combined: Surface,
}

impl LayerSet {
    pub fn get(&self, kind: LayerKind) -> &Surface {
        match kind {
            LayerKind::Raw => &self.raw,
            LayerKind::Heatmap => &self.heatmap,
            LayerKind::Regions => &self.regions,
            LayerKind::Combined => &self.combined,
        }
    }
}

/// Produce the four canonical variants from the base image and the two
/// prepared annotation layers.
///
/// Each derived variant composites flat from the base image:
/// - `heatmap`: base ⊕ heatmap at source-over, opacity 0.7
/// - `regions`: base ⊕ region layer at multiply
/// - `combined`: heatmap first, then the region layer, so the multiplicative
///   tint darkens the already-tinted heatmap rather than the raw base.
pub fn compose_layer_set(
    base: &Surface,
    heatmap_layer: &Surface,
    region_layer: &Surface,
) -> GazemapResult<LayerSet> {
    let raw = base.clone();

    let mut heatmap = base.clone();
    composite_in_place(
        &mut heatmap,
        heatmap_layer,
        BlendOp::SourceOver {
            opacity: HEATMAP_OPACITY,
        },
    )?;

    let mut regions = base.clone();
    composite_in_place(&mut regions, region_layer, BlendOp::Multiply)?;

    let mut combined = heatmap.clone();
    composite_in_place(&mut combined, region_layer, BlendOp::Multiply)?;

    Ok(LayerSet {
        raw,
        heatmap,
        regions,
        combined,
    })
}
