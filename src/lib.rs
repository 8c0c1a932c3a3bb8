//! radmark - annotation and compositing engine for dental radiographs.
//!
//! Converts AI-reported detection lists (bounding boxes and segmentation
//! contours) into rendered overlays on a base image, composites user
//! freehand strokes with the result, caches rendered blobs by a content
//! hash, and exports a self-contained HTML findings report.

pub mod cache;
pub mod compositor;
pub mod error;
pub mod geometry;
pub mod model;
pub mod overlay;
pub mod pipeline;
pub mod render;
pub mod report;

pub use error::RadmarkError;
pub use model::{AnalysisResult, Detection, DetectionGroup, DetectionKind};
pub use pipeline::RenderSession;
