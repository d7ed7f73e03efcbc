//! The drawing surface abstraction and the recording implementation.

use std::f64::consts::{FRAC_PI_2, TAU};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::trace;

use crate::matrix::Matrix;
use crate::paint::{
    CompositeOperation, FillRule, LineCap, LineJoin, PaintStyle, TextAlign, TextBaseline,
};
use crate::path::{Path2D, PathCommand};

static NEXT_BITMAP_ID: AtomicU64 = AtomicU64::new(1);

/// A decoded raster the surface can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageBitmap {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

impl ImageBitmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            id: NEXT_BITMAP_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
        }
    }
}

/// Result of `measure_text`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextMetrics {
    pub width: f64,
}

/// A 2D drawing surface with the HTML canvas state model.
pub trait RenderingContext2D {
    fn width(&self) -> f64;
    fn height(&self) -> f64;

    // State
    fn save(&mut self);
    fn restore(&mut self);

    // Transform
    fn translate(&mut self, x: f64, y: f64);
    fn rotate(&mut self, angle: f64);
    fn scale(&mut self, x: f64, y: f64);
    fn transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64);
    fn set_transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64);
    fn get_transform(&self) -> Matrix;

    // Path
    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn bezier_curve_to(&mut self, cp1x: f64, cp1y: f64, cp2x: f64, cp2y: f64, x: f64, y: f64);
    fn quadratic_curve_to(&mut self, cpx: f64, cpy: f64, x: f64, y: f64);
    fn arc(
        &mut self,
        x: f64,
        y: f64,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        counterclockwise: bool,
    );
    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64);
    fn close_path(&mut self);

    // Painting
    fn fill(&mut self, rule: FillRule);
    fn stroke(&mut self);
    fn clip(&mut self);
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64);
    fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64);
    fn fill_text(&mut self, text: &str, x: f64, y: f64);
    fn stroke_text(&mut self, text: &str, x: f64, y: f64);
    fn measure_text(&self, text: &str) -> TextMetrics;
    fn draw_image(&mut self, image: &ImageBitmap, dx: f64, dy: f64);

    // Styles
    fn set_fill_style(&mut self, style: PaintStyle);
    fn fill_style(&self) -> &PaintStyle;
    fn set_stroke_style(&mut self, style: PaintStyle);
    fn stroke_style(&self) -> &PaintStyle;
    fn set_line_width(&mut self, width: f64);
    fn line_width(&self) -> f64;
    fn set_line_cap(&mut self, cap: LineCap);
    fn set_line_join(&mut self, join: LineJoin);
    fn set_miter_limit(&mut self, limit: f64);
    fn set_line_dash(&mut self, dash: Vec<f64>);
    fn set_line_dash_offset(&mut self, offset: f64);
    fn set_global_alpha(&mut self, alpha: f64);
    fn global_alpha(&self) -> f64;
    fn set_global_composite_operation(&mut self, op: CompositeOperation);
    fn set_font(&mut self, font: &str);
    fn font(&self) -> &str;
    fn set_text_align(&mut self, align: TextAlign);
    fn set_text_baseline(&mut self, baseline: TextBaseline);
}

// ==================== Context State ====================

/// Canvas context state (for save/restore).
#[derive(Debug, Clone)]
pub struct ContextState {
    pub transform: Matrix,
    pub fill_style: PaintStyle,
    pub stroke_style: PaintStyle,
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    pub line_dash: Vec<f64>,
    pub line_dash_offset: f64,
    pub font: String,
    pub text_align: TextAlign,
    pub text_baseline: TextBaseline,
    pub global_alpha: f64,
    pub global_composite_operation: CompositeOperation,
}

impl Default for ContextState {
    fn default() -> Self {
        Self {
            transform: Matrix::identity(),
            fill_style: PaintStyle::default(),
            stroke_style: PaintStyle::default(),
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            line_dash: Vec::new(),
            line_dash_offset: 0.0,
            font: "10px sans-serif".to_string(),
            text_align: TextAlign::Start,
            text_baseline: TextBaseline::Alphabetic,
            global_alpha: 1.0,
            global_composite_operation: CompositeOperation::SourceOver,
        }
    }
}

// ==================== Draw Command ====================

/// Stroke parameters captured at draw time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrokeParams {
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    pub line_dash: Vec<f64>,
    pub line_dash_offset: f64,
}

/// A recorded drawing operation.
///
/// Paths are in device space; `transform` is the matrix current when the call was made.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawCommand {
    Save,
    Restore,
    /// Intersect the clip region with a path.
    Clip {
        path: Vec<PathCommand>,
        transform: Matrix,
    },
    FillPath {
        path: Vec<PathCommand>,
        rule: FillRule,
        paint: PaintStyle,
        alpha: f64,
        composite: CompositeOperation,
        transform: Matrix,
    },
    StrokePath {
        path: Vec<PathCommand>,
        paint: PaintStyle,
        stroke: StrokeParams,
        alpha: f64,
        composite: CompositeOperation,
        transform: Matrix,
    },
    FillRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        paint: PaintStyle,
        alpha: f64,
        transform: Matrix,
    },
    ClearRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        transform: Matrix,
    },
    FillText {
        text: String,
        x: f64,
        y: f64,
        paint: PaintStyle,
        font: String,
        align: TextAlign,
        baseline: TextBaseline,
        alpha: f64,
        transform: Matrix,
    },
    StrokeText {
        text: String,
        x: f64,
        y: f64,
        paint: PaintStyle,
        font: String,
        stroke: StrokeParams,
        alpha: f64,
        transform: Matrix,
    },
    DrawImage {
        image: ImageBitmap,
        dx: f64,
        dy: f64,
        alpha: f64,
        transform: Matrix,
    },
}

// ==================== Canvas Context ====================

/// A context that records every draw call as a [`DrawCommand`].
#[derive(Debug)]
pub struct CanvasRenderingContext2D {
    pub width: f64,
    pub height: f64,
    state: ContextState,
    state_stack: Vec<ContextState>,
    path: Path2D,
    commands: Vec<DrawCommand>,
}

impl CanvasRenderingContext2D {
    /// Create a new 2D context.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            state: ContextState::default(),
            state_stack: Vec::new(),
            path: Path2D::new(),
            commands: Vec::new(),
        }
    }

    /// Current drawing state.
    pub fn state(&self) -> &ContextState {
        &self.state
    }

    /// Depth of the save stack.
    pub fn save_depth(&self) -> usize {
        self.state_stack.len()
    }

    /// The path under construction.
    pub fn current_path(&self) -> &Path2D {
        &self.path
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Check if a device-space point is in the current path.
    pub fn is_point_in_path(&self, x: f64, y: f64, rule: FillRule) -> bool {
        self.path.contains_point(x, y, rule)
    }

    /// Check if a device-space point is on the current stroke.
    pub fn is_point_in_stroke(&self, x: f64, y: f64) -> bool {
        self.path.stroke_contains_point(x, y, self.state.line_width)
    }

    fn stroke_params(&self) -> StrokeParams {
        StrokeParams {
            line_width: self.state.line_width,
            line_cap: self.state.line_cap,
            line_join: self.state.line_join,
            miter_limit: self.state.miter_limit,
            line_dash: self.state.line_dash.clone(),
            line_dash_offset: self.state.line_dash_offset,
        }
    }

    fn premultiply(&mut self, m: Matrix) {
        self.state.transform = self.state.transform.multiply(&m);
    }

    fn to_device(&self, x: f64, y: f64) -> (f64, f64) {
        self.state.transform.apply(x, y)
    }
}

impl RenderingContext2D for CanvasRenderingContext2D {
    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn save(&mut self) {
        self.state_stack.push(self.state.clone());
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.state = state;
            self.commands.push(DrawCommand::Restore);
        } else {
            trace!("restore without matching save");
        }
    }

    fn translate(&mut self, x: f64, y: f64) {
        self.premultiply(Matrix::translate(x, y));
    }

    fn rotate(&mut self, angle: f64) {
        self.premultiply(Matrix::rotate(angle));
    }

    fn scale(&mut self, x: f64, y: f64) {
        self.premultiply(Matrix::scale(x, y));
    }

    fn transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) {
        self.premultiply(Matrix::new(a, b, c, d, e, f));
    }

    fn set_transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) {
        self.state.transform = Matrix::new(a, b, c, d, e, f);
    }

    fn get_transform(&self) -> Matrix {
        self.state.transform
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        let (x, y) = self.to_device(x, y);
        self.path.move_to(x, y);
    }

    fn line_to(&mut self, x: f64, y: f64) {
        let (x, y) = self.to_device(x, y);
        self.path.line_to(x, y);
    }

    fn bezier_curve_to(&mut self, cp1x: f64, cp1y: f64, cp2x: f64, cp2y: f64, x: f64, y: f64) {
        let (cp1x, cp1y) = self.to_device(cp1x, cp1y);
        let (cp2x, cp2y) = self.to_device(cp2x, cp2y);
        let (x, y) = self.to_device(x, y);
        self.path.bezier_curve_to(cp1x, cp1y, cp2x, cp2y, x, y);
    }

    fn quadratic_curve_to(&mut self, cpx: f64, cpy: f64, x: f64, y: f64) {
        let (cpx, cpy) = self.to_device(cpx, cpy);
        let (x, y) = self.to_device(x, y);
        self.path.quadratic_curve_to(cpx, cpy, x, y);
    }

    fn arc(
        &mut self,
        x: f64,
        y: f64,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        counterclockwise: bool,
    ) {
        let segments = arc_to_cubics(x, y, radius, start_angle, end_angle, counterclockwise);
        let Some(first) = segments.first() else {
            return;
        };
        let (sx, sy) = self.to_device(first[0].0, first[0].1);
        if self.path.is_empty() {
            self.path.move_to(sx, sy);
        } else {
            self.path.line_to(sx, sy);
        }
        for [_, c1, c2, end] in segments {
            self.bezier_curve_to(c1.0, c1.1, c2.0, c2.1, end.0, end.1);
        }
    }

    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let m = self.state.transform;
        if m.b == 0.0 && m.c == 0.0 {
            let (dx, dy) = m.apply(x, y);
            self.path.rect(dx, dy, width * m.a, height * m.d);
        } else {
            self.move_to(x, y);
            self.line_to(x + width, y);
            self.line_to(x + width, y + height);
            self.line_to(x, y + height);
            self.close_path();
        }
    }

    fn close_path(&mut self) {
        self.path.close_path();
    }

    fn fill(&mut self, rule: FillRule) {
        if self.path.is_empty() || self.state.fill_style.is_invisible() {
            return;
        }
        self.commands.push(DrawCommand::FillPath {
            path: self.path.commands().to_vec(),
            rule,
            paint: self.state.fill_style.clone(),
            alpha: self.state.global_alpha,
            composite: self.state.global_composite_operation,
            transform: self.state.transform,
        });
    }

    fn stroke(&mut self) {
        if self.path.is_empty() || self.state.stroke_style.is_invisible() {
            return;
        }
        self.commands.push(DrawCommand::StrokePath {
            path: self.path.commands().to_vec(),
            paint: self.state.stroke_style.clone(),
            stroke: self.stroke_params(),
            alpha: self.state.global_alpha,
            composite: self.state.global_composite_operation,
            transform: self.state.transform,
        });
    }

    fn clip(&mut self) {
        self.commands.push(DrawCommand::Clip {
            path: self.path.commands().to_vec(),
            transform: self.state.transform,
        });
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        if self.state.fill_style.is_invisible() {
            return;
        }
        self.commands.push(DrawCommand::FillRect {
            x,
            y,
            width,
            height,
            paint: self.state.fill_style.clone(),
            alpha: self.state.global_alpha,
            transform: self.state.transform,
        });
    }

    fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.commands.push(DrawCommand::ClearRect {
            x,
            y,
            width,
            height,
            transform: self.state.transform,
        });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        if self.state.fill_style.is_invisible() {
            return;
        }
        self.commands.push(DrawCommand::FillText {
            text: text.to_string(),
            x,
            y,
            paint: self.state.fill_style.clone(),
            font: self.state.font.clone(),
            align: self.state.text_align,
            baseline: self.state.text_baseline,
            alpha: self.state.global_alpha,
            transform: self.state.transform,
        });
    }

    fn stroke_text(&mut self, text: &str, x: f64, y: f64) {
        if self.state.stroke_style.is_invisible() {
            return;
        }
        self.commands.push(DrawCommand::StrokeText {
            text: text.to_string(),
            x,
            y,
            paint: self.state.stroke_style.clone(),
            font: self.state.font.clone(),
            stroke: self.stroke_params(),
            alpha: self.state.global_alpha,
            transform: self.state.transform,
        });
    }

    fn measure_text(&self, text: &str) -> TextMetrics {
        TextMetrics {
            width: text.chars().count() as f64 * font_size_px(&self.state.font) * 0.5,
        }
    }

    fn draw_image(&mut self, image: &ImageBitmap, dx: f64, dy: f64) {
        self.commands.push(DrawCommand::DrawImage {
            image: *image,
            dx,
            dy,
            alpha: self.state.global_alpha,
            transform: self.state.transform,
        });
    }

    fn set_fill_style(&mut self, style: PaintStyle) {
        self.state.fill_style = style;
    }

    fn fill_style(&self) -> &PaintStyle {
        &self.state.fill_style
    }

    fn set_stroke_style(&mut self, style: PaintStyle) {
        self.state.stroke_style = style;
    }

    fn stroke_style(&self) -> &PaintStyle {
        &self.state.stroke_style
    }

    fn set_line_width(&mut self, width: f64) {
        if width.is_finite() && width > 0.0 {
            self.state.line_width = width;
        }
    }

    fn line_width(&self) -> f64 {
        self.state.line_width
    }

    fn set_line_cap(&mut self, cap: LineCap) {
        self.state.line_cap = cap;
    }

    fn set_line_join(&mut self, join: LineJoin) {
        self.state.line_join = join;
    }

    fn set_miter_limit(&mut self, limit: f64) {
        if limit.is_finite() && limit > 0.0 {
            self.state.miter_limit = limit;
        }
    }

    fn set_line_dash(&mut self, dash: Vec<f64>) {
        if dash.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return;
        }
        // An odd-length list is repeated to make it even.
        self.state.line_dash = if dash.len() % 2 == 1 {
            dash.iter().chain(dash.iter()).copied().collect()
        } else {
            dash
        };
    }

    fn set_line_dash_offset(&mut self, offset: f64) {
        if offset.is_finite() {
            self.state.line_dash_offset = offset;
        }
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        if (0.0..=1.0).contains(&alpha) {
            self.state.global_alpha = alpha;
        }
    }

    fn global_alpha(&self) -> f64 {
        self.state.global_alpha
    }

    fn set_global_composite_operation(&mut self, op: CompositeOperation) {
        self.state.global_composite_operation = op;
    }

    fn set_font(&mut self, font: &str) {
        self.state.font = font.to_string();
    }

    fn font(&self) -> &str {
        &self.state.font
    }

    fn set_text_align(&mut self, align: TextAlign) {
        self.state.text_align = align;
    }

    fn set_text_baseline(&mut self, baseline: TextBaseline) {
        self.state.text_baseline = baseline;
    }
}

/// Split a canvas arc into cubic segments of at most a quarter turn each.
fn arc_to_cubics(
    cx: f64,
    cy: f64,
    r: f64,
    start: f64,
    end: f64,
    ccw: bool,
) -> Vec<[(f64, f64); 4]> {
    let sweep = if ccw {
        let diff = start - end;
        if diff >= TAU {
            -TAU
        } else {
            -diff.rem_euclid(TAU)
        }
    } else {
        let diff = end - start;
        if diff >= TAU {
            TAU
        } else {
            diff.rem_euclid(TAU)
        }
    };
    if !sweep.is_finite() || !r.is_finite() {
        return Vec::new();
    }

    let count = ((sweep.abs() / FRAC_PI_2).ceil() as usize).max(1);
    let step = sweep / count as f64;
    let k = 4.0 / 3.0 * (step / 4.0).tan();
    let at = |angle: f64| (cx + r * angle.cos(), cy + r * angle.sin());

    (0..count)
        .map(|i| {
            let a0 = start + step * i as f64;
            let a1 = a0 + step;
            let p0 = at(a0);
            let p3 = at(a1);
            let c1 = (p0.0 - k * r * a0.sin(), p0.1 + k * r * a0.cos());
            let c2 = (p3.0 + k * r * a1.sin(), p3.1 - k * r * a1.cos());
            [p0, c1, c2, p3]
        })
        .collect()
}

/// Pixel size from a CSS font shorthand, 10 when absent.
fn font_size_px(font: &str) -> f64 {
    font.split_whitespace()
        .filter_map(|part| part.split('/').next())
        .find_map(|part| part.strip_suffix("px"))
        .and_then(|size| size.parse::<f64>().ok())
        .unwrap_or(10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    #[test]
    fn test_context_creation() {
        let ctx = CanvasRenderingContext2D::new(800.0, 600.0);
        assert_eq!(ctx.width(), 800.0);
        assert_eq!(ctx.height(), 600.0);
        assert!(ctx.commands().is_empty());
    }

    #[test]
    fn test_context_save_restore() {
        let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
        ctx.set_line_width(5.0);
        ctx.save();
        ctx.set_line_width(10.0);
        ctx.translate(5.0, 5.0);
        assert_eq!(ctx.line_width(), 10.0);
        ctx.restore();
        assert_eq!(ctx.line_width(), 5.0);
        assert_eq!(ctx.get_transform(), Matrix::identity());
        assert_eq!(ctx.save_depth(), 0);
    }

    #[test]
    fn test_transform_composition() {
        let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
        ctx.translate(10.0, 0.0);
        ctx.scale(2.0, 2.0);
        assert_eq!(ctx.get_transform().apply(1.0, 1.0), (12.0, 2.0));
    }

    #[test]
    fn test_fill_records_path() {
        let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
        ctx.set_fill_style(PaintStyle::Color(Color::from_rgb(255, 0, 0)));
        ctx.begin_path();
        ctx.rect(10.0, 10.0, 50.0, 50.0);
        ctx.fill(FillRule::EvenOdd);

        match &ctx.commands()[0] {
            DrawCommand::FillPath { path, rule, .. } => {
                assert_eq!(path.len(), 1);
                assert_eq!(*rule, FillRule::EvenOdd);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(ctx.is_point_in_path(20.0, 20.0, FillRule::NonZero));
    }

    #[test]
    fn test_transparent_paint_is_skipped() {
        let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
        ctx.set_stroke_style(PaintStyle::Color(Color::TRANSPARENT));
        ctx.move_to(0.0, 0.0);
        ctx.line_to(10.0, 10.0);
        ctx.stroke();
        assert!(ctx.commands().is_empty());
    }

    #[test]
    fn test_line_dash_odd_length() {
        let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
        ctx.set_line_dash(vec![5.0, 3.0, 1.0]);
        assert_eq!(ctx.state().line_dash, vec![5.0, 3.0, 1.0, 5.0, 3.0, 1.0]);
        ctx.set_line_dash(vec![-1.0]);
        assert_eq!(ctx.state().line_dash.len(), 6);
    }

    #[test]
    fn test_path_points_follow_transform() {
        let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
        ctx.translate(10.0, 20.0);
        ctx.move_to(1.0, 1.0);
        ctx.translate(-10.0, -20.0);
        ctx.line_to(1.0, 1.0);
        assert_eq!(
            ctx.current_path().commands(),
            &[
                PathCommand::MoveTo { x: 11.0, y: 21.0 },
                PathCommand::LineTo { x: 1.0, y: 1.0 }
            ]
        );
    }

    #[test]
    fn test_arc_becomes_cubics() {
        let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
        ctx.scale(2.0, 1.0);
        ctx.arc(0.0, 0.0, 10.0, 0.0, std::f64::consts::PI, false);
        let commands = ctx.current_path().commands();
        assert_eq!(commands[0], PathCommand::MoveTo { x: 20.0, y: 0.0 });
        assert_eq!(commands.len(), 3);
        match commands[2] {
            PathCommand::BezierCurveTo { x, y, .. } => {
                assert!((x + 20.0).abs() < 1e-9);
                assert!(y.abs() < 1e-9);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_measure_text() {
        let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
        ctx.set_font("bold 20px serif");
        assert_eq!(ctx.measure_text("abcd").width, 40.0);
    }

    #[test]
    fn test_commands_serialize() {
        let mut ctx = CanvasRenderingContext2D::new(10.0, 10.0);
        ctx.fill_rect(0.0, 0.0, 5.0, 5.0);
        let json = serde_json::to_value(ctx.commands()).unwrap();
        assert_eq!(json[0]["kind"], "fill_rect");
        assert_eq!(json[0]["paint"]["type"], "color");
    }
}
