use crate::model::{AttentionPoint, RasterDims, RegionAnnotation, SkillCategory};

/// Attention point scaled into pixel space, ready for field accumulation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldPoint {
    pub x: f32,
    pub y: f32,
    pub weight: f32,
}

/// Region annotation scaled into pixel space with a half-open extent
/// `[x0, x1) × [y0, y1)`. Guaranteed non-degenerate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelRegion {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
    pub category: SkillCategory,
}

/// Clamp annotations into percent range and scale them to pixel space.
///
/// Upstream annotation noise is expected: out-of-range coordinates are
/// clamped and regions that are degenerate after clamping are dropped.
/// A single malformed annotation never fails the whole layer set, so this
/// function does not error.
pub fn normalize(
    points: &[AttentionPoint],
    regions: &[RegionAnnotation],
    dims: RasterDims,
) -> (Vec<FieldPoint>, Vec<PixelRegion>) {
    let points = points
        .iter()
        .map(|p| FieldPoint {
            x: percent_to_px(p.x, dims.width),
            y: percent_to_px(p.y, dims.height),
            weight: clamp_unit(p.weight),
        })
        .collect();

    let regions = regions
        .iter()
        .filter_map(|r| {
            let x0 = percent_to_edge(r.xmin, dims.width);
            let x1 = percent_to_edge(r.xmax, dims.width);
            let y0 = percent_to_edge(r.ymin, dims.height);
            let y1 = percent_to_edge(r.ymax, dims.height);
            if x1 <= x0 || y1 <= y0 {
                return None;
            }
            Some(PixelRegion {
                x0,
                y0,
                x1,
                y1,
                category: r.category,
            })
        })
        .collect();

    (points, regions)
}

fn clamp_percent(v: f32) -> f32 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 100.0)
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 1.0)
}

/// Map a percent coordinate onto pixel centers, so 100% lands on the last
/// pixel rather than one past the raster.
fn percent_to_px(pct: f32, extent: u32) -> f32 {
    clamp_percent(pct) / 100.0 * (extent.saturating_sub(1)) as f32
}

/// Map a percent coordinate onto a region edge in `[0, extent]`.
fn percent_to_edge(pct: f32, extent: u32) -> u32 {
    let px = (clamp_percent(pct) / 100.0 * extent as f32).round();
    (px as u32).min(extent)
}
