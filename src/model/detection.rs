//! Detection types and wire-format normalization.
//!
//! Detections arrive from the remote analysis service as JSON. Two quirks of
//! that format are absorbed here, at the model boundary, so downstream code
//! sees exactly one shape:
//!
//! - Mask contours are sent either as a list of `[x, y]` pairs or as a
//!   flattened numeric list of even length. Both deserialize into [`Contour`].
//! - Class display names drift between model versions; legacy names are
//!   remapped to one canonical label via [`canonical_display_name`].

use image::Rgba;
use serde::{Deserialize, Serialize};

/// Fallback draw color when a detection carries none.
pub const DEFAULT_DETECTION_COLOR: &str = "#FF0000";

/// Canonical display name of the caries category (drawn as a circle).
pub const CARIES_LABEL: &str = "Caries";

/// Canonical display name of the mandibular canal category, which is always
/// segmentation-style even when the service omits `kind`.
pub const MANDIBULAR_CANAL_LABEL: &str = "Mandibular Canal";

/// Legacy display names still emitted by older model versions, mapped to
/// their canonical replacements.
const LEGACY_NAME_REMAP: &[(&str, &str)] = &[
    ("Cavity", CARIES_LABEL),
    ("Dental Caries", CARIES_LABEL),
    ("Horizontal Bone Loss", "Bone Loss"),
    ("Vertical Bone Loss", "Bone Loss"),
    ("Periapical Radiolucency", "Periapical Lesion"),
    ("Inferior Alveolar Canal", MANDIBULAR_CANAL_LABEL),
];

/// Map a raw display name to its canonical form.
///
/// Names not present in the remap table pass through unchanged.
pub fn canonical_display_name(name: &str) -> &str {
    LEGACY_NAME_REMAP
        .iter()
        .find(|(legacy, _)| *legacy == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

/// Parse a `#RRGGBB` hex color into an opaque RGBA pixel.
///
/// Returns `None` for anything that is not exactly seven characters of
/// `#` + six hex digits.
pub fn parse_hex_color(hex: &str) -> Option<Rgba<u8>> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
    let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
    let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
    Some(Rgba([r, g, b, 255]))
}

/// Axis-aligned bounding box in source-image pixel space, corner format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Create a bounding box from two corners.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box width (may be negative for degenerate input; callers clamp).
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Box height.
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Centroid of the box.
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Length of the box diagonal.
    pub fn diagonal(&self) -> f32 {
        let w = self.width();
        let h = self.height();
        (w * w + h * h).sqrt()
    }
}

/// Wire encoding of mask contours: nested `[x, y]` pairs or a flattened
/// even-length numeric list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ContourWire {
    Pairs(Vec<[f32; 2]>),
    Flat(Vec<f32>),
}

/// Canonical polygon outline: an ordered point sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Contour {
    points: Vec<(f32, f32)>,
}

impl Contour {
    /// Build a contour from an explicit point list.
    pub fn from_points(points: Vec<(f32, f32)>) -> Self {
        Self { points }
    }

    /// Build a contour from a flattened `[x0, y0, x1, y1, ...]` list.
    ///
    /// An odd trailing value is dropped with a logged warning.
    pub fn from_flat(values: &[f32]) -> Self {
        if values.len() % 2 != 0 {
            log::warn!(
                "flattened contour has odd length {}; dropping trailing value",
                values.len()
            );
        }
        let points = values
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .collect();
        Self { points }
    }

    /// The normalized point sequence.
    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    /// Whether the contour carries no points at all.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl<'de> Deserialize<'de> for Contour {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let wire = ContourWire::deserialize(deserializer)?;
        Ok(match wire {
            ContourWire::Pairs(pairs) => Contour::from_points(
                pairs.into_iter().map(|[x, y]| (x, y)).collect(),
            ),
            ContourWire::Flat(values) => Contour::from_flat(&values),
        })
    }
}

/// How a detection is drawn: a box marker or a segmentation outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionKind {
    /// Axis-aligned box marker (or circle, for the caries category).
    Box,
    /// Polygon outline from a segmentation mask.
    Segmentation,
}

/// One AI-reported finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Raw model class identifier.
    #[serde(default)]
    pub class_label: String,
    /// Human-readable name as sent; canonicalize via
    /// [`canonical_display_name`] before grouping or draw-style decisions.
    pub display_name: String,
    /// Model confidence in [0, 1].
    pub confidence: f32,
    /// Box extent, present for box-style detections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    /// Polygon outline, present for segmentation-style detections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask_contours: Option<Contour>,
    /// Hex draw color; falls back to [`DEFAULT_DETECTION_COLOR`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Draw style; inferred from the canonical name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<DetectionKind>,
}

impl Detection {
    /// Create a box-style detection.
    pub fn boxed(display_name: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_label: String::new(),
            display_name: display_name.into(),
            confidence,
            bounding_box: Some(bbox),
            mask_contours: None,
            color: None,
            kind: Some(DetectionKind::Box),
        }
    }

    /// Create a segmentation-style detection.
    pub fn segmented(
        display_name: impl Into<String>,
        confidence: f32,
        contour: Contour,
    ) -> Self {
        Self {
            class_label: String::new(),
            display_name: display_name.into(),
            confidence,
            bounding_box: None,
            mask_contours: Some(contour),
            color: None,
            kind: Some(DetectionKind::Segmentation),
        }
    }

    /// Set the draw color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Canonical display name after legacy remapping.
    pub fn canonical_name(&self) -> &str {
        canonical_display_name(&self.display_name)
    }

    /// Effective draw style. Missing `kind` is inferred: the mandibular
    /// canal class is always segmentation, everything else defaults to box.
    pub fn effective_kind(&self) -> DetectionKind {
        match self.kind {
            Some(kind) => kind,
            None if self.canonical_name() == MANDIBULAR_CANAL_LABEL => {
                DetectionKind::Segmentation
            }
            None => DetectionKind::Box,
        }
    }

    /// Resolved draw color (own color parsed, else the fixed fallback).
    pub fn draw_color(&self) -> Rgba<u8> {
        self.color
            .as_deref()
            .and_then(parse_hex_color)
            .or_else(|| parse_hex_color(DEFAULT_DETECTION_COLOR))
            .unwrap_or(Rgba([255, 0, 0, 255]))
    }

    /// Whether the detection carries any spatial data at all. Detections
    /// without are skipped by the renderer with a warning.
    pub fn has_geometry(&self) -> bool {
        self.bounding_box.is_some()
            || self.mask_contours.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// Result object returned by the remote analysis service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// All findings reported for one radiograph.
    pub detections: Vec<Detection>,
    /// Locator of the analyzed source image (URL or storage path).
    #[serde(default)]
    pub image_url: String,
}
