//! Freehand stroke overlay engine.
//!
//! Captures pointer gestures as ordered point lists and recomposes the full
//! stroke set over the base image on every change. Drawing is
//! non-destructive: because erase can remove strokes drawn underneath later
//! ones, no persistent canvas state is assumed and every update is a full
//! redraw.

use image::{Rgba, RgbaImage};

use crate::render::{RasterSurface, Surface};

/// Proximity radius for erase actions, in image-space units. Any stroke with
/// at least one point inside this radius of the erase point is removed
/// whole.
pub const ERASE_RADIUS: f32 = 20.0;

/// Fixed width for freehand strokes.
pub const STROKE_WIDTH: u32 = 3;

/// Fixed color for freehand strokes.
pub const STROKE_COLOR: Rgba<u8> = Rgba([255, 82, 82, 255]);

/// Active tool mode. Only one is active at a time; the caller toggles it
/// explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    /// Pointer gestures record strokes.
    #[default]
    Draw,
    /// Each pointer-down is a discrete erase action.
    Erase,
}

/// One continuous freehand gesture: an ordered, append-only point list.
/// Immutable once the gesture ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    points: Vec<(f32, f32)>,
}

impl Stroke {
    fn new(start: (f32, f32)) -> Self {
        Self {
            points: vec![start],
        }
    }

    /// The recorded points, in gesture order.
    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    /// Whether any point lies within `radius` of `(x, y)`.
    pub fn touches(&self, x: f32, y: f32, radius: f32) -> bool {
        self.points.iter().any(|(px, py)| {
            let dx = px - x;
            let dy = py - y;
            dx * dx + dy * dy <= radius * radius
        })
    }
}

/// Freehand drawing session over one base image.
///
/// State machine: `Idle → Drawing → Idle` in draw mode (pointer down opens a
/// stroke, moves append to it, up commits it); in erase mode every pointer
/// down is an instantaneous erase with no drag continuation.
pub struct OverlayEngine {
    base: RgbaImage,
    canvas: RgbaImage,
    strokes: Vec<Stroke>,
    active: Option<Stroke>,
    mode: ToolMode,
}

impl OverlayEngine {
    /// Start a session over the given base image.
    pub fn new(base: RgbaImage) -> Self {
        let canvas = base.clone();
        Self {
            base,
            canvas,
            strokes: Vec::new(),
            active: None,
            mode: ToolMode::Draw,
        }
    }

    /// Switch between draw and erase. An in-progress stroke is committed
    /// first so mode changes never lose a gesture.
    pub fn set_mode(&mut self, mode: ToolMode) {
        if self.active.is_some() {
            self.pointer_up();
        }
        self.mode = mode;
    }

    /// Current tool mode.
    pub fn mode(&self) -> ToolMode {
        self.mode
    }

    /// Handle pointer down at image-space `(x, y)`.
    pub fn pointer_down(&mut self, x: f32, y: f32) {
        match self.mode {
            ToolMode::Draw => {
                self.active = Some(Stroke::new((x, y)));
                self.redraw();
            }
            ToolMode::Erase => self.erase_at(x, y),
        }
    }

    /// Handle pointer move. Appends to the active stroke and redraws; a
    /// no-op outside a draw gesture (erase has no drag continuation).
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if let Some(stroke) = self.active.as_mut() {
            stroke.points.push((x, y));
            self.redraw();
        }
    }

    /// Handle pointer up: commits the active stroke into the stroke set.
    pub fn pointer_up(&mut self) {
        if let Some(stroke) = self.active.take() {
            self.strokes.push(stroke);
            self.redraw();
        }
    }

    /// Remove every stroke with a point within [`ERASE_RADIUS`] of the erase
    /// point, then redraw immediately. Whole strokes only, never partial.
    fn erase_at(&mut self, x: f32, y: f32) {
        let before = self.strokes.len();
        self.strokes
            .retain(|stroke| !stroke.touches(x, y, ERASE_RADIUS));
        if self.strokes.len() != before {
            log::debug!(
                "erased {} stroke(s) at ({x:.1}, {y:.1})",
                before - self.strokes.len()
            );
            self.redraw();
        }
    }

    /// Completed strokes, in draw order.
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// Whether at least one stroke has been committed.
    pub fn has_strokes(&self) -> bool {
        !self.strokes.is_empty()
    }

    /// The composited canvas: base image plus all strokes.
    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Clear the canvas, redraw the base at (0,0), then stroke each
    /// completed stroke and the active one, each as an independent path.
    fn redraw(&mut self) {
        self.canvas = self.base.clone();
        let mut surface = RasterSurface::new(&mut self.canvas);
        for stroke in &self.strokes {
            surface.stroke_polyline(&stroke.points, STROKE_COLOR, STROKE_WIDTH);
        }
        if let Some(active) = &self.active {
            surface.stroke_polyline(&active.points, STROKE_COLOR, STROKE_WIDTH);
        }
    }
}
