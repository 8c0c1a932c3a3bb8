//! Annotation renderer: rasterizes a detection list over a base image.
//!
//! Drawing goes through the [`Surface`] trait so the draw-call selection
//! (rectangle vs circle vs polygon) is observable in tests without decoding
//! pixels. The production implementation, [`RasterSurface`], draws onto an
//! [`RgbaImage`] with `imageproc` primitives.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use std::io::Cursor;

use crate::error::RadmarkError;
use crate::model::{Detection, DetectionKind, CARIES_LABEL};

/// Outline width for segmentation polygons.
pub const SEGMENTATION_LINE_WIDTH: u32 = 2;

/// Outline width for box and circle markers.
pub const BOX_LINE_WIDTH: u32 = 3;

/// Drawing operations the renderer needs. Stroke only, no fills.
pub trait Surface {
    /// Stroke an axis-aligned rectangle given two corners.
    fn stroke_rect(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Rgba<u8>, width: u32);

    /// Stroke a circle outline.
    fn stroke_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba<u8>, width: u32);

    /// Stroke a closed polygon outline through the given points.
    fn stroke_polygon(&mut self, points: &[(f32, f32)], color: Rgba<u8>, width: u32);

    /// Stroke an open polyline with round caps.
    fn stroke_polyline(&mut self, points: &[(f32, f32)], color: Rgba<u8>, width: u32);
}

/// [`Surface`] implementation over an RGBA raster.
pub struct RasterSurface<'a> {
    image: &'a mut RgbaImage,
}

impl<'a> RasterSurface<'a> {
    /// Wrap a raster for drawing.
    pub fn new(image: &'a mut RgbaImage) -> Self {
        Self { image }
    }

    /// Stamp a thick segment as filled circles along its length. This gives
    /// round caps and joins without tracking segment orientation.
    fn stamp_segment(&mut self, a: (f32, f32), b: (f32, f32), color: Rgba<u8>, width: u32) {
        let radius = (width as i32 / 2).max(1);
        let dx = b.0 - a.0;
        let dy = b.1 - a.1;
        let length = (dx * dx + dy * dy).sqrt();
        let steps = length.ceil().max(1.0) as u32;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = (a.0 + dx * t).round() as i32;
            let y = (a.1 + dy * t).round() as i32;
            draw_filled_circle_mut(self.image, (x, y), radius, color);
        }
    }
}

impl Surface for RasterSurface<'_> {
    fn stroke_rect(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Rgba<u8>, width: u32) {
        let left = x1.min(x2).round() as i32;
        let top = y1.min(y2).round() as i32;
        let w = (x2 - x1).abs().round() as u32;
        let h = (y2 - y1).abs().round() as u32;
        // Concentric 1px rectangles, shrinking inward
        for inset in 0..width as i32 {
            let iw = w as i64 - 2 * inset as i64;
            let ih = h as i64 - 2 * inset as i64;
            if iw <= 0 || ih <= 0 {
                break;
            }
            let rect = Rect::at(left + inset, top + inset).of_size(iw as u32, ih as u32);
            draw_hollow_rect_mut(self.image, rect, color);
        }
    }

    fn stroke_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba<u8>, width: u32) {
        let center = (cx.round() as i32, cy.round() as i32);
        let outer = radius.round() as i32;
        for inset in 0..width as i32 {
            let r = outer - inset;
            if r <= 0 {
                break;
            }
            draw_hollow_circle_mut(self.image, center, r, color);
        }
    }

    fn stroke_polygon(&mut self, points: &[(f32, f32)], color: Rgba<u8>, width: u32) {
        match points {
            [] => {}
            [single] => self.stamp_segment(*single, *single, color, width),
            _ => {
                for pair in points.windows(2) {
                    self.stamp_segment(pair[0], pair[1], color, width);
                }
                // Close the path back to the first point
                self.stamp_segment(points[points.len() - 1], points[0], color, width);
            }
        }
    }

    fn stroke_polyline(&mut self, points: &[(f32, f32)], color: Rgba<u8>, width: u32) {
        match points {
            [] => {}
            [single] => self.stamp_segment(*single, *single, color, width),
            _ => {
                for pair in points.windows(2) {
                    self.stamp_segment(pair[0], pair[1], color, width);
                }
            }
        }
    }
}

/// Draw a detection list onto a surface, in list order (later entries draw
/// on top of earlier ones).
///
/// Per detection: segmentation-style findings with at least one contour
/// point are stroked as closed polygon outlines; box-style findings draw a
/// circle for the caries category (centered on the box centroid, radius half
/// the box diagonal) and a plain rectangle for everything else. A detection
/// with neither representation is skipped with a warning and never aborts
/// the rest of the batch.
pub fn draw_detections(surface: &mut dyn Surface, detections: &[Detection]) {
    for det in detections {
        let color = det.draw_color();

        if det.effective_kind() == DetectionKind::Segmentation {
            if let Some(contour) = det.mask_contours.as_ref().filter(|c| !c.is_empty()) {
                surface.stroke_polygon(contour.points(), color, SEGMENTATION_LINE_WIDTH);
                continue;
            }
        }

        if let Some(bbox) = det.bounding_box {
            if det.canonical_name() == CARIES_LABEL {
                // Caries markers are circles sized by the box diagonal so
                // they stand out from generic rectangular findings.
                let (cx, cy) = bbox.center();
                surface.stroke_circle(cx, cy, bbox.diagonal() / 2.0, color, BOX_LINE_WIDTH);
            } else {
                surface.stroke_rect(bbox.x1, bbox.y1, bbox.x2, bbox.y2, color, BOX_LINE_WIDTH);
            }
            continue;
        }

        log::warn!(
            "detection '{}' has neither bounding box nor mask contours; skipping",
            det.display_name
        );
    }
}

/// Decode a base image and rasterize the detections over a copy of it.
pub fn annotate_image(
    base_bytes: &[u8],
    detections: &[Detection],
) -> Result<RgbaImage, RadmarkError> {
    let mut image = image::load_from_memory(base_bytes)
        .map_err(RadmarkError::decode)?
        .to_rgba8();
    let mut surface = RasterSurface::new(&mut image);
    draw_detections(&mut surface, detections);
    Ok(image)
}

/// Encode a raster as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, RadmarkError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, image::ImageFormat::Png)?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, Contour};

    /// Records which draw primitives were invoked, without rasterizing.
    #[derive(Default)]
    struct RecordingSurface {
        rects: Vec<(f32, f32, f32, f32)>,
        circles: Vec<(f32, f32, f32)>,
        polygons: Vec<usize>,
        polylines: Vec<usize>,
    }

    impl Surface for RecordingSurface {
        fn stroke_rect(
            &mut self,
            x1: f32,
            y1: f32,
            x2: f32,
            y2: f32,
            _color: Rgba<u8>,
            _width: u32,
        ) {
            self.rects.push((x1, y1, x2, y2));
        }

        fn stroke_circle(
            &mut self,
            cx: f32,
            cy: f32,
            radius: f32,
            _color: Rgba<u8>,
            _width: u32,
        ) {
            self.circles.push((cx, cy, radius));
        }

        fn stroke_polygon(&mut self, points: &[(f32, f32)], _color: Rgba<u8>, _width: u32) {
            self.polygons.push(points.len());
        }

        fn stroke_polyline(&mut self, points: &[(f32, f32)], _color: Rgba<u8>, _width: u32) {
            self.polylines.push(points.len());
        }
    }

    #[test]
    fn test_segmentation_never_hits_rect_or_circle() {
        let det = Detection::segmented(
            "Mandibular Canal",
            0.9,
            Contour::from_points(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]),
        );
        let mut surface = RecordingSurface::default();
        draw_detections(&mut surface, &[det]);
        assert_eq!(surface.polygons, vec![3]);
        assert!(surface.rects.is_empty());
        assert!(surface.circles.is_empty());
        assert!(surface.polylines.is_empty());
    }

    #[test]
    fn test_caries_box_draws_circle_not_rectangle() {
        let det = Detection::boxed("Caries", 0.9, BoundingBox::new(10.0, 20.0, 40.0, 60.0));
        let mut surface = RecordingSurface::default();
        draw_detections(&mut surface, &[det]);
        assert!(surface.rects.is_empty());
        assert_eq!(surface.circles.len(), 1);
        let (cx, cy, radius) = surface.circles[0];
        assert_eq!((cx, cy), (25.0, 40.0));
        // Radius is half the box diagonal, not half the width or height
        assert_eq!(radius, 25.0);
    }

    #[test]
    fn test_legacy_caries_name_also_draws_circle() {
        let det = Detection::boxed("Cavity", 0.9, BoundingBox::new(0.0, 0.0, 30.0, 40.0));
        let mut surface = RecordingSurface::default();
        draw_detections(&mut surface, &[det]);
        assert_eq!(surface.circles.len(), 1);
        assert!(surface.rects.is_empty());
    }

    #[test]
    fn test_generic_box_draws_rectangle() {
        let det = Detection::boxed("Bone Loss", 0.7, BoundingBox::new(1.0, 2.0, 3.0, 4.0));
        let mut surface = RecordingSurface::default();
        draw_detections(&mut surface, &[det]);
        assert_eq!(surface.rects, vec![(1.0, 2.0, 3.0, 4.0)]);
        assert!(surface.circles.is_empty());
    }

    #[test]
    fn test_malformed_detection_skipped_without_aborting() {
        let mut malformed = Detection::boxed("Caries", 0.5, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        malformed.bounding_box = None;
        let valid = Detection::boxed("Bone Loss", 0.7, BoundingBox::new(1.0, 2.0, 3.0, 4.0));

        let mut surface = RecordingSurface::default();
        draw_detections(&mut surface, &[malformed, valid]);
        // Remaining valid entry still rendered
        assert_eq!(surface.rects.len(), 1);
        assert!(surface.circles.is_empty());
    }

    #[test]
    fn test_list_order_preserved() {
        let first = Detection::boxed("Bone Loss", 0.7, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        let second = Detection::boxed("Bone Loss", 0.8, BoundingBox::new(2.0, 2.0, 3.0, 3.0));
        let mut surface = RecordingSurface::default();
        draw_detections(&mut surface, &[first, second]);
        assert_eq!(
            surface.rects,
            vec![(0.0, 0.0, 1.0, 1.0), (2.0, 2.0, 3.0, 3.0)]
        );
    }

    #[test]
    fn test_annotate_image_rejects_undecodable_base() {
        let err = annotate_image(b"not an image", &[]).unwrap_err();
        assert!(matches!(err, RadmarkError::Decode { .. }));
    }

    #[test]
    fn test_annotate_image_draws_onto_copy() {
        let base = RgbaImage::from_pixel(64, 64, Rgba([0, 0, 0, 255]));
        let bytes = encode_png(&base).unwrap();
        let det = Detection::boxed("Bone Loss", 0.7, BoundingBox::new(8.0, 8.0, 40.0, 40.0))
            .with_color("#00FF00");
        let out = annotate_image(&bytes, &[det]).unwrap();
        assert_eq!(out.dimensions(), (64, 64));
        // Rectangle outline touches its top-left corner
        assert_eq!(out.get_pixel(8, 8), &Rgba([0, 255, 0, 255]));
        // Interior stays untouched (outline only, no fill)
        assert_eq!(out.get_pixel(24, 24), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_raster_polygon_outline_only() {
        let mut image = RgbaImage::from_pixel(50, 50, Rgba([0, 0, 0, 255]));
        {
            let mut surface = RasterSurface::new(&mut image);
            surface.stroke_polygon(
                &[(10.0, 10.0), (40.0, 10.0), (40.0, 40.0), (10.0, 40.0)],
                Rgba([255, 0, 0, 255]),
                2,
            );
        }
        assert_eq!(image.get_pixel(10, 10), &Rgba([255, 0, 0, 255]));
        assert_eq!(image.get_pixel(25, 25), &Rgba([0, 0, 0, 255]));
    }
}
