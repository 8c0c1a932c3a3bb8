//! radmark CLI: annotate a radiograph with analysis detections and export
//! the findings report.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use radmark::cache::{DiskCache, MemoryCache, RenderCache};
use radmark::compositor::composite_data_url;
use radmark::model::{group_detections, AnalysisResult, Detection};
use radmark::pipeline::RenderSession;
use radmark::report::{export_report, ReportMetadata};
use radmark::RadmarkError;

const USAGE: &str = "Usage: radmark <image> <detections.json> \
[--out annotated.png] [--report report.html] [--min-confidence F] \
[--clinician NAME] [--date TEXT]";

struct Args {
    image: PathBuf,
    detections: PathBuf,
    out: Option<PathBuf>,
    report: Option<PathBuf>,
    min_confidence: f32,
    clinician: String,
    date: String,
}

fn parse_args() -> Result<Args, String> {
    let mut positional: Vec<String> = Vec::new();
    let mut out = None;
    let mut report = None;
    let mut min_confidence = 0.0_f32;
    let mut clinician = String::new();
    let mut date = String::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut flag_value = |name: &str| {
            args.next().ok_or_else(|| format!("{name} needs a value"))
        };
        match arg.as_str() {
            "--out" => out = Some(PathBuf::from(flag_value("--out")?)),
            "--report" => report = Some(PathBuf::from(flag_value("--report")?)),
            "--min-confidence" => {
                min_confidence = flag_value("--min-confidence")?
                    .parse()
                    .map_err(|e| format!("--min-confidence: {e}"))?;
            }
            "--clinician" => clinician = flag_value("--clinician")?,
            "--date" => date = flag_value("--date")?,
            "--help" | "-h" => return Err(USAGE.to_string()),
            other if other.starts_with("--") => {
                return Err(format!("unknown flag {other}\n{USAGE}"));
            }
            other => positional.push(other.to_string()),
        }
    }

    if positional.len() != 2 {
        return Err(USAGE.to_string());
    }
    let detections = PathBuf::from(positional.pop().unwrap_or_default());
    let image = PathBuf::from(positional.pop().unwrap_or_default());
    Ok(Args {
        image,
        detections,
        out,
        report,
        min_confidence,
        clinician,
        date,
    })
}

/// Load detections from either a bare list or a full analysis-result object.
fn load_detections(path: &Path) -> Result<Vec<Detection>, RadmarkError> {
    let json = std::fs::read_to_string(path)?;
    if let Ok(list) = serde_json::from_str::<Vec<Detection>>(&json) {
        return Ok(list);
    }
    let result: AnalysisResult = serde_json::from_str(&json)?;
    Ok(result.detections)
}

fn run(args: Args) -> Result<(), RadmarkError> {
    let base_bytes = std::fs::read(&args.image)?;
    let all = load_detections(&args.detections)?;

    // Below-threshold detections are an expected miss, not an error
    let detections: Vec<Detection> = all
        .into_iter()
        .filter(|d| d.confidence >= args.min_confidence)
        .collect();
    log::info!(
        "rendering {} detection(s) over {:?}",
        detections.len(),
        args.image
    );

    let cache: Box<dyn RenderCache> = match DiskCache::open_default() {
        Some(disk) => Box::new(disk),
        None => Box::new(MemoryCache::new()),
    };
    let mut session = RenderSession::new(cache);

    let locator = args.image.to_string_lossy().into_owned();
    let url = session
        .render_annotated(&locator, &base_bytes, &detections, |key, _| {
            log::debug!("annotated render ready for key {key}");
        })?
        .ok_or_else(|| RadmarkError::Export {
            reason: "render session closed before completion".to_string(),
        })?;

    if let Some(out) = &args.out {
        let blob = session.resolve(&url).ok_or_else(|| RadmarkError::Export {
            reason: "annotated blob was revoked before save".to_string(),
        })?;
        std::fs::write(out, blob)?;
        log::info!("wrote annotated image to {out:?}");
    }

    if let Some(report_path) = &args.report {
        let groups = group_detections(&detections);
        // Report embeds the annotated raster, re-encoded from the cached blob
        let blob = session.resolve(&url).ok_or_else(|| RadmarkError::Export {
            reason: "annotated blob was revoked before report assembly".to_string(),
        })?;
        let image_url = composite_data_url(blob, None)?;

        let meta = ReportMetadata {
            title: format!(
                "Radiograph findings: {}",
                args.image
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            ),
            clinician: args.clinician.clone(),
            source_name: locator.clone(),
            generated_at: args.date.clone(),
        };
        export_report(report_path, &groups, &image_url, &meta)?;
        log::info!("wrote report to {report_path:?}");
    }

    session.revoke(&url);
    session.teardown();
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("radmark: {e}");
            ExitCode::FAILURE
        }
    }
}
