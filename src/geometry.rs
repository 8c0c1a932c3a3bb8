//! Pointer-to-image coordinate mathematics.
//!
//! The annotation canvas is displayed at an arbitrary on-screen size while
//! its backing raster keeps the image's natural pixel dimensions. These
//! functions translate viewport pointer positions into image-space
//! coordinates. They are pure: the display rectangle and scale are passed in
//! on every call and never cached, so the math stays correct under live
//! canvas resizing.

/// On-screen bounding rectangle of the canvas, in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl CanvasRect {
    /// Create a rectangle from its top-left corner and size.
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// A pointer event position, from either a mouse or a touch sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerInput {
    /// Mouse position in viewport coordinates.
    Mouse { client_x: f32, client_y: f32 },
    /// Touch points in viewport coordinates; only the first is used.
    Touch { points: Vec<(f32, f32)> },
}

impl PointerInput {
    /// Viewport position of this input: the mouse position, or the first
    /// touch point. `None` for an empty touch sequence.
    pub fn client_position(&self) -> Option<(f32, f32)> {
        match self {
            PointerInput::Mouse { client_x, client_y } => Some((*client_x, *client_y)),
            PointerInput::Touch { points } => points.first().copied(),
        }
    }
}

/// Translate a pointer input into image-space coordinates.
///
/// `image_x = (client_x - rect.left) * (canvas_width / rect.width)`, and the
/// same for y. Returns `None` only for an empty touch sequence.
pub fn to_image_coords(
    input: &PointerInput,
    rect: CanvasRect,
    canvas_width: u32,
    canvas_height: u32,
) -> Option<(f32, f32)> {
    let (client_x, client_y) = input.client_position()?;
    let scale_x = canvas_width as f32 / rect.width;
    let scale_y = canvas_height as f32 / rect.height;
    Some((
        (client_x - rect.left) * scale_x,
        (client_y - rect.top) * scale_y,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 0.0001;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_identity_scale() {
        // Canvas displayed at its natural size: offsets subtract, no scaling
        let rect = CanvasRect::new(10.0, 20.0, 800.0, 600.0);
        let input = PointerInput::Mouse {
            client_x: 110.0,
            client_y: 120.0,
        };
        let (x, y) = to_image_coords(&input, rect, 800, 600).unwrap();
        assert!(approx_eq(x, 100.0));
        assert!(approx_eq(y, 100.0));
    }

    #[test]
    fn test_downscaled_display() {
        // 1600x1200 image shown in a 400x300 rect: scale factor 4
        let rect = CanvasRect::new(0.0, 0.0, 400.0, 300.0);
        let input = PointerInput::Mouse {
            client_x: 100.0,
            client_y: 75.0,
        };
        let (x, y) = to_image_coords(&input, rect, 1600, 1200).unwrap();
        assert!(approx_eq(x, 400.0));
        assert!(approx_eq(y, 300.0));
    }

    #[test]
    fn test_non_uniform_scale() {
        let rect = CanvasRect::new(50.0, 0.0, 200.0, 600.0);
        let input = PointerInput::Mouse {
            client_x: 150.0,
            client_y: 300.0,
        };
        let (x, y) = to_image_coords(&input, rect, 400, 300).unwrap();
        assert!(approx_eq(x, 200.0));
        assert!(approx_eq(y, 150.0));
    }

    #[test]
    fn test_touch_uses_first_point() {
        let rect = CanvasRect::new(0.0, 0.0, 100.0, 100.0);
        let input = PointerInput::Touch {
            points: vec![(30.0, 40.0), (90.0, 90.0)],
        };
        let (x, y) = to_image_coords(&input, rect, 100, 100).unwrap();
        assert!(approx_eq(x, 30.0));
        assert!(approx_eq(y, 40.0));
    }

    #[test]
    fn test_empty_touch_yields_none() {
        let rect = CanvasRect::new(0.0, 0.0, 100.0, 100.0);
        let input = PointerInput::Touch { points: vec![] };
        assert_eq!(to_image_coords(&input, rect, 100, 100), None);
    }

    #[test]
    fn test_resize_recomputed_per_call() {
        // Same pointer position maps differently after the rect shrinks,
        // because nothing about the previous call is cached.
        let input = PointerInput::Mouse {
            client_x: 50.0,
            client_y: 50.0,
        };
        let before = CanvasRect::new(0.0, 0.0, 200.0, 200.0);
        let after = CanvasRect::new(0.0, 0.0, 100.0, 100.0);
        let (x1, _) = to_image_coords(&input, before, 400, 400).unwrap();
        let (x2, _) = to_image_coords(&input, after, 400, 400).unwrap();
        assert!(approx_eq(x1, 100.0));
        assert!(approx_eq(x2, 200.0));
    }
}
