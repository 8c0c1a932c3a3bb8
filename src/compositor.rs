//! Compositing of the annotated base image with the freehand overlay.

use image::imageops;
use image::RgbaImage;

use crate::cache::blob_to_data_url;
use crate::error::RadmarkError;
use crate::overlay::OverlayEngine;
use crate::render::encode_png;

/// Merge the base image with the optional freehand overlay into one raster.
///
/// The base is decoded fresh and drawn at its natural size. The overlay is
/// drawn on top only when supplied and at least one stroke was committed; an
/// overlay at a different resolution is scaled to the base dimensions first.
pub fn merge_base_and_overlay(
    base_bytes: &[u8],
    overlay: Option<&OverlayEngine>,
) -> Result<RgbaImage, RadmarkError> {
    let mut composite = image::load_from_memory(base_bytes)
        .map_err(RadmarkError::decode)?
        .to_rgba8();

    if let Some(engine) = overlay {
        if engine.has_strokes() {
            let canvas = engine.canvas();
            if canvas.dimensions() == composite.dimensions() {
                imageops::overlay(&mut composite, canvas, 0, 0);
            } else {
                let (w, h) = composite.dimensions();
                let scaled = imageops::resize(canvas, w, h, imageops::FilterType::Triangle);
                imageops::overlay(&mut composite, &scaled, 0, 0);
            }
        }
    }

    Ok(composite)
}

/// [`merge_base_and_overlay`], encoded as a PNG data URL for embedding.
pub fn composite_data_url(
    base_bytes: &[u8],
    overlay: Option<&OverlayEngine>,
) -> Result<String, RadmarkError> {
    let composite = merge_base_and_overlay(base_bytes, overlay)?;
    let png = encode_png(&composite)?;
    Ok(blob_to_data_url("image/png", &png))
}
