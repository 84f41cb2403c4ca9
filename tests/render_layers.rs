use std::io::Cursor;

use gazemap::{
    encode::encode_png, render_layer_set, AttentionPoint, LayerKind, RegionAnnotation,
    SkillCategory,
};

fn base_png(w: u32, h: u32) -> Vec<u8> {
    let mut img = image::RgbaImage::new(w, h);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let v = 255 - ((x * 7 + y * 13) % 128) as u8;
        *px = image::Rgba([v, v.wrapping_sub(10), v.wrapping_sub(20), 255]);
    }
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn points() -> Vec<AttentionPoint> {
    vec![
        AttentionPoint {
            x: 30.0,
            y: 25.0,
            weight: 0.9,
        },
        AttentionPoint {
            x: 70.0,
            y: 60.0,
            weight: 0.5,
        },
    ]
}

fn regions() -> Vec<RegionAnnotation> {
    vec![
        RegionAnnotation {
            xmin: 10.0,
            ymin: 10.0,
            xmax: 55.0,
            ymax: 40.0,
            category: SkillCategory::Hard,
            label: "Rust".to_string(),
        },
        RegionAnnotation {
            xmin: 50.0,
            ymin: 50.0,
            xmax: 90.0,
            ymax: 80.0,
            category: SkillCategory::Education,
            label: "BSc".to_string(),
        },
    ]
}

#[test]
fn full_pipeline_is_byte_deterministic_across_runs() {
    let png = base_png(96, 64);

    let (a, _) = render_layer_set(&png, &points(), &regions()).unwrap();
    let (b, _) = render_layer_set(&png, &points(), &regions()).unwrap();

    for kind in LayerKind::ALL {
        let bytes_a = encode_png(a.get(kind)).unwrap();
        let bytes_b = encode_png(b.get(kind)).unwrap();
        assert_eq!(bytes_a, bytes_b, "layer {kind} must be byte-identical");
    }
}

#[test]
fn the_four_variants_are_distinct_when_annotated() {
    let png = base_png(96, 64);
    let (set, _) = render_layer_set(&png, &points(), &regions()).unwrap();

    let encoded: Vec<Vec<u8>> = LayerKind::ALL
        .iter()
        .map(|&kind| encode_png(set.get(kind)).unwrap())
        .collect();

    for i in 0..encoded.len() {
        for j in (i + 1)..encoded.len() {
            assert_ne!(
                encoded[i], encoded[j],
                "{} and {} should differ",
                LayerKind::ALL[i],
                LayerKind::ALL[j]
            );
        }
    }
}

#[test]
fn out_of_range_point_renders_like_its_clamped_twin() {
    let png = base_png(80, 50);
    let wild = [AttentionPoint {
        x: 150.0,
        y: -30.0,
        weight: 0.8,
    }];
    let clamped = [AttentionPoint {
        x: 100.0,
        y: 0.0,
        weight: 0.8,
    }];

    let (a, _) = render_layer_set(&png, &wild, &[]).unwrap();
    let (b, _) = render_layer_set(&png, &clamped, &[]).unwrap();
    assert_eq!(a.heatmap, b.heatmap);
    // And the wild point did contribute signal.
    assert_ne!(a.heatmap, a.raw);
}

#[test]
fn degenerate_region_is_invisible_and_harmless() {
    let png = base_png(80, 50);
    let degenerate = [RegionAnnotation {
        xmin: 60.0,
        ymin: 20.0,
        xmax: 40.0,
        ymax: 30.0,
        category: SkillCategory::Impact,
        label: "inverted".to_string(),
    }];

    let (with, _) = render_layer_set(&png, &[], &degenerate).unwrap();
    let (without, _) = render_layer_set(&png, &[], &[]).unwrap();
    assert_eq!(with.regions, without.regions);
    assert_eq!(with.combined, without.combined);
}

#[test]
fn empty_annotations_leave_every_variant_equal_to_raw() {
    let png = base_png(64, 64);
    let (set, _) = render_layer_set(&png, &[], &[]).unwrap();
    assert_eq!(set.heatmap, set.raw);
    assert_eq!(set.regions, set.raw);
    assert_eq!(set.combined, set.raw);
}
