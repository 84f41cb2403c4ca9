use crate::{
    error::GazemapResult,
    model::{RasterDims, SkillCategory},
    normalize::PixelRegion,
    surface::{over, premultiply, Surface},
};

/// Fill color per skill category, straight RGBA at ~40% opacity. Region
/// overlays tint the document rather than occlude it.
pub fn category_fill(category: SkillCategory) -> [u8; 4] {
    match category {
        SkillCategory::Hard => [239, 68, 68, 102],
        SkillCategory::Soft => [59, 130, 246, 102],
        SkillCategory::Impact => [245, 158, 11, 102],
        SkillCategory::Education => [16, 185, 129, 102],
    }
}

/// Draw skill regions as semi-transparent boxes on a transparent surface.
///
/// Overlaps blend by plain source-over in paint order; regions are advisory,
/// so last-drawn-wins is acceptable.
pub fn render_regions(regions: &[PixelRegion], dims: RasterDims) -> GazemapResult<Surface> {
    let mut surface = Surface::new(dims)?;
    let width = dims.width;
    let data = surface.as_mut_slice();

    for region in regions {
        let fill = premultiply(category_fill(region.category));
        for y in region.y0..region.y1 {
            let row = (y * width) as usize * 4;
            for x in region.x0..region.x1 {
                let idx = row + (x as usize) * 4;
                let dst = [data[idx], data[idx + 1], data[idx + 2], data[idx + 3]];
                let out = over(dst, fill, 1.0);
                data[idx..idx + 4].copy_from_slice(&out);
            }
        }
    }

    Ok(surface)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> RasterDims {
        RasterDims {
            width: 20,
            height: 20,
        }
    }

    fn region(x0: u32, y0: u32, x1: u32, y1: u32, category: SkillCategory) -> PixelRegion {
        PixelRegion {
            x0,
            y0,
            x1,
            y1,
            category,
        }
    }

    #[test]
    fn background_stays_transparent() {
        let surface =
            render_regions(&[region(5, 5, 10, 10, SkillCategory::Hard)], dims()).unwrap();
        assert_eq!(surface.pixel(0, 0), [0, 0, 0, 0]);
        assert_eq!(surface.pixel(10, 10), [0, 0, 0, 0]);
    }

    #[test]
    fn filled_region_carries_category_color() {
        let surface =
            render_regions(&[region(5, 5, 10, 10, SkillCategory::Soft)], dims()).unwrap();
        let expected = premultiply(category_fill(SkillCategory::Soft));
        assert_eq!(surface.pixel(5, 5), expected);
        assert_eq!(surface.pixel(9, 9), expected);
    }

    #[test]
    fn overlapping_regions_blend_in_paint_order() {
        let regions = [
            region(0, 0, 10, 10, SkillCategory::Hard),
            region(5, 5, 15, 15, SkillCategory::Education),
        ];
        let surface = render_regions(&regions, dims()).unwrap();

        let hard_only = premultiply(category_fill(SkillCategory::Hard));
        let overlap = surface.pixel(7, 7);
        assert_ne!(overlap, hard_only);
        // The later (education) fill dominates but the overlap is denser
        // than a single 40% fill.
        assert!(overlap[3] > hard_only[3]);
    }

    #[test]
    fn empty_region_list_yields_fully_transparent_layer() {
        let surface = render_regions(&[], dims()).unwrap();
        assert!(surface.as_slice().iter().all(|&b| b == 0));
    }
}
