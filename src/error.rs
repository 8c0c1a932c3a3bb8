//! Error types for the annotation and compositing engine.

use thiserror::Error;

/// Errors that can occur in the render, cache, and export pipeline.
///
/// Malformed detections (neither bounding box nor contours) are deliberately
/// not represented here: they are skipped with a logged warning and must
/// never abort a render batch.
#[derive(Error, Debug)]
pub enum RadmarkError {
    /// A base or overlay image failed to decode. Aborts only the affected
    /// render, never the surrounding view.
    #[error("image decode failed: {reason}")]
    Decode {
        /// Description of the decode failure
        reason: String,
    },

    /// Image encoding failed while producing a rasterized result.
    #[error("image encode error: {0}")]
    Image(#[from] image::ImageError),

    /// A data URL was malformed or carried an unsupported encoding.
    #[error("invalid data URL: {reason}")]
    InvalidDataUrl {
        /// Description of the malformation
        reason: String,
    },

    /// Report assembly or export failed.
    #[error("export failed: {reason}")]
    Export {
        /// Description of the export failure
        reason: String,
    },

    /// I/O error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RadmarkError {
    /// Construct a decode error from any displayable cause.
    pub fn decode(cause: impl std::fmt::Display) -> Self {
        RadmarkError::Decode {
            reason: cause.to_string(),
        }
    }
}
