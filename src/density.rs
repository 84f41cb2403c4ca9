use crate::{
    error::GazemapResult,
    model::RasterDims,
    normalize::FieldPoint,
};

/// Kernel radius as a fraction of the larger raster extent. Resolution
/// adaptive: the same annotation set produces the same relative footprint
/// at any raster size.
pub const FALLOFF_RADIUS_FRAC: f32 = 0.15;

/// Per-pixel scalar intensity map in `[0,1]`, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityField {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl DensityField {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dims(&self) -> RasterDims {
        RasterDims {
            width: self.width,
            height: self.height,
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn value_at(&self, x: u32, y: u32) -> f32 {
        self.values[(y * self.width + x) as usize]
    }
}

/// Accumulate weighted attention points into an intensity field.
///
/// Each point contributes a linear radial falloff kernel
/// `weight * (1 - d/r)` for `d < r`, with `r = max(width, height) * 0.15`.
/// Overlapping kernels combine with the screen rule
/// `v = v + k - v*k`, so hotspots reinforce each other and saturate at 1.0
/// instead of summing past it or clipping to a flat disk.
///
/// An empty point set yields an all-zero field.
pub fn accumulate(points: &[FieldPoint], dims: RasterDims) -> GazemapResult<DensityField> {
    dims.validate()?;
    let mut values = vec![0.0f32; dims.pixel_count()?];

    let w = dims.width as i64;
    let h = dims.height as i64;
    let radius = dims.width.max(dims.height) as f32 * FALLOFF_RADIUS_FRAC;

    for point in points {
        if point.weight <= 0.0 || radius <= 0.0 {
            continue;
        }

        let x_lo = ((point.x - radius).floor() as i64).clamp(0, w - 1);
        let x_hi = ((point.x + radius).ceil() as i64).clamp(0, w - 1);
        let y_lo = ((point.y - radius).floor() as i64).clamp(0, h - 1);
        let y_hi = ((point.y + radius).ceil() as i64).clamp(0, h - 1);

        for y in y_lo..=y_hi {
            let dy = y as f32 - point.y;
            let row = (y * w) as usize;
            for x in x_lo..=x_hi {
                let dx = x as f32 - point.x;
                let d = (dx * dx + dy * dy).sqrt();
                if d >= radius {
                    continue;
                }
                let k = (point.weight * (1.0 - d / radius)).clamp(0.0, 1.0);
                if k <= 0.0 {
                    continue;
                }
                let v = &mut values[row + x as usize];
                *v = (*v + k - *v * k).min(1.0);
            }
        }
    }

    Ok(DensityField {
        width: dims.width,
        height: dims.height,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(w: u32, h: u32) -> RasterDims {
        RasterDims {
            width: w,
            height: h,
        }
    }

    fn point(x: f32, y: f32, weight: f32) -> FieldPoint {
        FieldPoint { x, y, weight }
    }

    #[test]
    fn empty_point_set_yields_zero_field() {
        let field = accumulate(&[], dims(16, 16)).unwrap();
        assert!(field.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn peak_sits_at_the_point_center() {
        let field = accumulate(&[point(8.0, 8.0, 1.0)], dims(16, 16)).unwrap();
        let center = field.value_at(8, 8);
        assert!((center - 1.0).abs() < 1e-6);
        assert!(field.value_at(8, 9) < center);
        assert!(field.value_at(0, 0) == 0.0);
    }

    #[test]
    fn overlapping_points_saturate_instead_of_summing() {
        let pts = [point(10.0, 10.0, 0.9), point(10.0, 10.0, 0.9)];
        let field = accumulate(&pts, dims(32, 32)).unwrap();
        let v = field.value_at(10, 10);
        // Screen rule: 1 - (1 - 0.9)^2 = 0.99.
        assert!(v <= 1.0);
        assert!(v > 0.9);
        assert!((v - 0.99).abs() < 1e-5);
    }

    #[test]
    fn field_values_stay_in_unit_range() {
        let pts: Vec<FieldPoint> = (0..8)
            .map(|i| point(12.0 + i as f32 * 0.3, 12.0, 1.0))
            .collect();
        let field = accumulate(&pts, dims(24, 24)).unwrap();
        assert!(field.values().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn radius_tracks_the_larger_extent() {
        // Wide raster: radius = 100 * 0.15 = 15 px, so a point at x=50
        // contributes nothing beyond x=65.
        let field = accumulate(&[point(50.0, 5.0, 1.0)], dims(100, 10)).unwrap();
        assert!(field.value_at(64, 5) > 0.0);
        assert_eq!(field.value_at(66, 5), 0.0);
    }

    #[test]
    fn zero_weight_point_contributes_nothing() {
        let field = accumulate(&[point(8.0, 8.0, 0.0)], dims(16, 16)).unwrap();
        assert!(field.values().iter().all(|&v| v == 0.0));
    }
}
