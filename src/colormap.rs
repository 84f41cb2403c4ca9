use crate::{
    density::DensityField,
    error::GazemapResult,
    surface::{mul_div255, Surface},
};

/// Fixed 6-stop perceptual ramp (position, RGB). The exact stop table and
/// linear per-channel interpolation are a bit-reproducibility requirement:
/// two renders of the same field must be visually identical.
pub const RAMP_STOPS: [(f32, [u8; 3]); 6] = [
    (0.0, [0, 0, 4]),
    (0.2, [66, 10, 104]),
    (0.4, [147, 38, 103]),
    (0.6, [221, 81, 58]),
    (0.8, [252, 165, 10]),
    (1.0, [252, 255, 164]),
];

/// Intensities below this are excluded from the layer entirely, keeping the
/// heatmap sparse so the underlying document stays legible.
pub const ALPHA_CUTOFF: f32 = 0.05;

/// Interpolated ramp color for an intensity in `[0,1]`.
pub fn ramp_color(t: f32) -> [u8; 3] {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };

    for pair in RAMP_STOPS.windows(2) {
        let (p0, c0) = pair[0];
        let (p1, c1) = pair[1];
        if t <= p1 {
            let f = (t - p0) / (p1 - p0);
            let mut out = [0u8; 3];
            for i in 0..3 {
                let a = c0[i] as f32;
                let b = c1[i] as f32;
                out[i] = (a + (b - a) * f).round() as u8;
            }
            return out;
        }
    }
    RAMP_STOPS[RAMP_STOPS.len() - 1].1
}

/// Alpha for an intensity: transparent below the cutoff, then
/// `clamp(t*200 + 50, 0, 255)`.
pub fn alpha_for(t: f32) -> u8 {
    if !t.is_finite() || t < ALPHA_CUTOFF {
        return 0;
    }
    (t * 200.0 + 50.0).clamp(0.0, 255.0).round() as u8
}

/// Convert an intensity field into a premultiplied RGBA heatmap surface.
pub fn colorize(field: &DensityField) -> GazemapResult<Surface> {
    let dims = field.dims();
    let mut data = Vec::with_capacity(dims.rgba8_len()?);

    for &t in field.values() {
        let a = alpha_for(t);
        if a == 0 {
            data.extend_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        let rgb = ramp_color(t);
        data.push(mul_div255(u16::from(rgb[0]), u16::from(a)));
        data.push(mul_div255(u16::from(rgb[1]), u16::from(a)));
        data.push(mul_div255(u16::from(rgb[2]), u16::from(a)));
        data.push(a);
    }

    Surface::from_premul_rgba8(dims, data)
}
