use std::io::Cursor;

use crate::{
    error::{GazemapError, GazemapResult},
    model::RasterDims,
    surface::Surface,
};

/// The only artifact MIME type this subsystem produces.
pub const MIME_PNG: &str = "image/png";

/// Decode an encoded base image into a premultiplied RGBA surface.
pub fn decode_base_image(bytes: &[u8]) -> GazemapResult<Surface> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|err| GazemapError::render(format!("decode base image: {err}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let dims = RasterDims::new(width, height)?;

    let mut data = rgba.into_raw();
    premultiply_rgba8_in_place(&mut data);
    Surface::from_premul_rgba8(dims, data)
}

/// Encode a surface as PNG bytes. Un-premultiplies once, here, so the whole
/// render path stays in premultiplied space.
pub fn encode_png(surface: &Surface) -> GazemapResult<Vec<u8>> {
    let mut data = surface.as_slice().to_vec();
    unpremultiply_rgba8_in_place(&mut data);

    let img = image::RgbaImage::from_raw(surface.width(), surface.height(), data)
        .ok_or_else(|| GazemapError::render("surface buffer does not match its dimensions"))?;

    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|err| GazemapError::render(format!("encode png: {err}")))?;
    Ok(buf)
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 0 || a == 255 {
            continue;
        }
        for c in 0..3 {
            let v = (px[c] as u32 * 255 + a / 2) / a;
            px[c] = v.min(255) as u8;
        }
    }
}
