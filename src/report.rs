//! Self-contained HTML report assembly and export.
//!
//! The report embeds the composited image inline as a PNG data URL next to a
//! findings list and a color legend, with no external resource references,
//! so the file opens offline. Assembly is deterministic from its inputs
//! (the timestamp is caller-supplied), which keeps it golden-file testable.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::RadmarkError;
use crate::model::DetectionGroup;

/// Report header fields supplied by external collaborators.
#[derive(Debug, Clone, Default)]
pub struct ReportMetadata {
    /// Report title, typically the radiograph or patient label.
    pub title: String,
    /// Display name of the reviewing user.
    pub clinician: String,
    /// Name of the analyzed source image.
    pub source_name: String,
    /// Pre-formatted generation timestamp. Caller-supplied so assembly
    /// stays deterministic.
    pub generated_at: String,
}

/// Escape text for interpolation into HTML.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Assemble the report document.
///
/// `image_data_url` must already be a PNG data URL (see
/// [`crate::compositor::composite_data_url`]). Returns the full UTF-8 HTML
/// document string.
pub fn build_report(
    groups: &[DetectionGroup],
    image_data_url: &str,
    meta: &ReportMetadata,
) -> Result<String, RadmarkError> {
    if !image_data_url.starts_with("data:image/") {
        return Err(RadmarkError::Export {
            reason: "report image must be an inline data URL".to_string(),
        });
    }

    let mut doc = String::new();
    doc.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(doc, "<title>{}</title>", escape_html(&meta.title));
    doc.push_str(
        "<style>\n\
         body { font-family: sans-serif; margin: 2rem; color: #222; }\n\
         h1 { font-size: 1.4rem; }\n\
         .meta { color: #555; font-size: 0.9rem; margin-bottom: 1rem; }\n\
         .radiograph { max-width: 100%; border: 1px solid #ccc; }\n\
         table { border-collapse: collapse; margin-top: 1rem; }\n\
         th, td { border: 1px solid #ccc; padding: 0.4rem 0.8rem; text-align: left; }\n\
         .swatch { display: inline-block; width: 0.8rem; height: 0.8rem; \
         border: 1px solid #888; margin-right: 0.4rem; vertical-align: middle; }\n\
         </style>\n</head>\n<body>\n",
    );

    let _ = writeln!(doc, "<h1>{}</h1>", escape_html(&meta.title));
    let _ = writeln!(
        doc,
        "<p class=\"meta\">Source: {} &middot; Reviewed by: {} &middot; Generated: {}</p>",
        escape_html(&meta.source_name),
        escape_html(&meta.clinician),
        escape_html(&meta.generated_at)
    );
    let _ = writeln!(
        doc,
        "<img class=\"radiograph\" src=\"{image_data_url}\" alt=\"Annotated radiograph\">"
    );

    doc.push_str("<h2>Findings</h2>\n");
    if groups.is_empty() {
        doc.push_str("<p>No findings above the confidence threshold.</p>\n");
    } else {
        doc.push_str(
            "<table>\n<tr><th>Finding</th><th>Count</th>\
             <th>Max confidence</th><th>Description</th></tr>\n",
        );
        for group in groups {
            let _ = writeln!(
                doc,
                "<tr><td><span class=\"swatch\" style=\"background:{}\"></span>{}</td>\
                 <td>{}</td><td>{:.0}%</td><td>{}</td></tr>",
                escape_html(&group.color),
                escape_html(&group.display_name),
                group.count,
                group.max_confidence * 100.0,
                escape_html(group.description)
            );
        }
        doc.push_str("</table>\n");

        doc.push_str("<h2>Legend</h2>\n<ul>\n");
        for group in groups {
            let _ = writeln!(
                doc,
                "<li><span class=\"swatch\" style=\"background:{}\"></span>{}</li>",
                escape_html(&group.color),
                escape_html(&group.display_name)
            );
        }
        doc.push_str("</ul>\n");
    }

    doc.push_str("</body>\n</html>\n");
    Ok(doc)
}

/// Assemble the report and write it to `path`.
///
/// The document is built in full before anything touches the filesystem, so
/// an assembly failure leaves no partial file behind.
pub fn export_report(
    path: &Path,
    groups: &[DetectionGroup],
    image_data_url: &str,
    meta: &ReportMetadata,
) -> Result<(), RadmarkError> {
    let doc = build_report(groups, image_data_url, meta)?;
    std::fs::write(path, doc.as_bytes())?;
    log::info!(
        "exported report with {} finding group(s) to {:?}",
        groups.len(),
        path
    );
    Ok(())
}
