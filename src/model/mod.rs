//! Data model for AI-reported radiograph findings.

mod detection;
mod group;

pub use detection::{
    canonical_display_name, parse_hex_color, AnalysisResult, BoundingBox, Contour, Detection,
    DetectionKind, CARIES_LABEL, DEFAULT_DETECTION_COLOR, MANDIBULAR_CANAL_LABEL,
};
pub use group::{finding_description, group_detections, DetectionGroup};
