//! Aggregation of detections by canonical display name.

use super::detection::{canonical_display_name, Detection, DEFAULT_DETECTION_COLOR};

/// Patient-facing description per finding category, used in the report.
const FINDING_DESCRIPTIONS: &[(&str, &str)] = &[
    (
        "Caries",
        "Area of tooth decay where demineralization has damaged the tooth structure.",
    ),
    (
        "Bone Loss",
        "Reduction in alveolar bone height, often associated with periodontal disease.",
    ),
    (
        "Periapical Lesion",
        "Radiolucent area around a root apex suggesting inflammation or infection.",
    ),
    (
        "Impacted Tooth",
        "Tooth that has failed to erupt fully into its expected position.",
    ),
    (
        "Mandibular Canal",
        "Outline of the inferior alveolar nerve canal, relevant for treatment planning.",
    ),
    (
        "Restoration",
        "Existing filling, crown, or other restorative material.",
    ),
    (
        "Root Piece",
        "Retained root fragment without an intact crown.",
    ),
];

const DEFAULT_DESCRIPTION: &str = "Finding reported by the analysis model.";

/// Description shown next to a finding category in the report.
pub fn finding_description(canonical_name: &str) -> &'static str {
    FINDING_DESCRIPTIONS
        .iter()
        .find(|(name, _)| *name == canonical_name)
        .map(|(_, description)| *description)
        .unwrap_or(DEFAULT_DESCRIPTION)
}

/// Detections aggregated by canonical display name, for legend and report
/// display.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionGroup {
    /// Canonical display name shared by the grouped detections.
    pub display_name: String,
    /// Number of detections with this name.
    pub count: usize,
    /// Highest confidence seen across the group.
    pub max_confidence: f32,
    /// Color of the first-seen detection (hex), else the fixed fallback.
    pub color: String,
    /// Patient-facing description for the report.
    pub description: &'static str,
}

/// Group detections by canonical display name in one scan.
///
/// The first-seen detection of a name seeds the group; subsequent ones
/// increment the count and raise the max confidence. Group order follows
/// first appearance in the input list.
pub fn group_detections(detections: &[Detection]) -> Vec<DetectionGroup> {
    let mut groups: Vec<DetectionGroup> = Vec::new();
    for det in detections {
        let name = canonical_display_name(&det.display_name);
        match groups.iter_mut().find(|g| g.display_name == name) {
            Some(group) => {
                group.count += 1;
                if det.confidence > group.max_confidence {
                    group.max_confidence = det.confidence;
                }
            }
            None => groups.push(DetectionGroup {
                display_name: name.to_string(),
                count: 1,
                max_confidence: det.confidence,
                color: det
                    .color
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DETECTION_COLOR.to_string()),
                description: finding_description(name),
            }),
        }
    }
    groups
}
