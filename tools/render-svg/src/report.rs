//! Reports over a recorded frame.
//!
//! Either a per-kind count of the draw commands or the full command list as JSON.

use std::collections::BTreeMap;
use std::path::Path;

use svgpaint_canvas::DrawCommand;
use svgpaint_common::SvgPaintError;

/// Summary of one rendered frame.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameSummary {
    /// Surface width in pixels.
    pub width: f64,
    /// Surface height in pixels.
    pub height: f64,
    /// Total number of recorded commands.
    pub total: usize,
    /// Commands per kind, keyed by their serialized tag.
    pub kinds: BTreeMap<String, usize>,
}

/// Error type for report operations.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to serialize commands: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ReportError> for SvgPaintError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::Io(e) => SvgPaintError::Io(e),
            ReportError::Json(e) => SvgPaintError::render(format!("failed to report frame: {}", e)),
        }
    }
}

/// Count commands by kind.
pub fn summarize(width: f64, height: f64, commands: &[DrawCommand]) -> Result<FrameSummary, ReportError> {
    let mut kinds = BTreeMap::new();
    for command in commands {
        let value = serde_json::to_value(command)?;
        let kind = value
            .get("kind")
            .and_then(|kind| kind.as_str())
            .unwrap_or("unknown")
            .to_string();
        *kinds.entry(kind).or_insert(0) += 1;
    }
    Ok(FrameSummary {
        width,
        height,
        total: commands.len(),
        kinds,
    })
}

impl FrameSummary {
    /// Plain-text rendering of the summary.
    pub fn to_text(&self) -> String {
        let mut text = format!(
            "Frame {}x{}: {} commands\n",
            self.width, self.height, self.total
        );
        for (kind, count) in &self.kinds {
            text.push_str(&format!("  {:<14} {}\n", kind, count));
        }
        text
    }
}

/// The command list as pretty JSON.
pub fn commands_json(commands: &[DrawCommand]) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(commands)?)
}

/// Write `text` to `path`, or print it when no path is given.
pub fn emit(text: &str, path: Option<&Path>) -> Result<(), ReportError> {
    match path {
        Some(path) => {
            std::fs::write(path, text)?;
            println!("Report written to: {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use svgpaint_canvas::{CanvasRenderingContext2D, FillRule, RenderingContext2D};

    fn frame() -> CanvasRenderingContext2D {
        let mut ctx = CanvasRenderingContext2D::new(20.0, 10.0);
        ctx.save();
        ctx.begin_path();
        ctx.rect(0.0, 0.0, 5.0, 5.0);
        ctx.fill(FillRule::NonZero);
        ctx.begin_path();
        ctx.rect(5.0, 0.0, 5.0, 5.0);
        ctx.fill(FillRule::NonZero);
        ctx.restore();
        ctx
    }

    #[test]
    fn test_summarize_counts_kinds() {
        let ctx = frame();
        let summary = summarize(20.0, 10.0, ctx.commands()).unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.kinds.get("fill_path"), Some(&2));
        assert_eq!(summary.kinds.get("save"), Some(&1));
        assert_eq!(summary.kinds.get("restore"), Some(&1));

        let text = summary.to_text();
        assert!(text.starts_with("Frame 20x10: 4 commands"));
        assert!(text.contains("fill_path"));
    }

    #[test]
    fn test_commands_json() {
        let ctx = frame();
        let json = commands_json(ctx.commands()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(4));
        assert_eq!(parsed[1]["kind"], "fill_path");
    }

    #[test]
    fn test_emit_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        emit("hello\n", Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn test_emit_failure_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err: SvgPaintError = emit("x", Some(&dir.path().join("missing/report.txt")))
            .unwrap_err()
            .into();
        assert_eq!(err.category(), "io");
    }
}
