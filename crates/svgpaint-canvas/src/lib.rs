//! # svgpaint Canvas
//!
//! The 2D drawing surface the SVG renderer paints into.
//!
//! ## Features
//!
//! - **RenderingContext2D**: the canvas-style surface trait (state stack, transforms, paths)
//! - **CanvasRenderingContext2D**: a recording implementation that captures draw calls
//! - **Paints**: solid colors, linear/radial gradients, recorded patterns
//! - **Colors**: CSS color parsing with the full named color table
//!
//! ## Architecture
//!
//! ```text
//! RenderingContext2D (trait)
//!    └── CanvasRenderingContext2D
//!           ├── Context State Stack
//!           │      ├── Matrix
//!           │      └── Fill/Stroke Style
//!           ├── Current Path
//!           └── Recorded DrawCommands
//! ```

pub mod color;
pub mod context;
pub mod matrix;
pub mod paint;
pub mod path;

use thiserror::Error;

pub use color::{normalize_color, parse_color, Color};
pub use context::{
    CanvasRenderingContext2D, ContextState, DrawCommand, ImageBitmap, RenderingContext2D,
    StrokeParams, TextMetrics,
};
pub use matrix::Matrix;
pub use paint::{
    CompositeOperation, FillRule, GradientStop, LineCap, LineJoin, LinearGradient, PaintStyle,
    Pattern, PatternRepetition, RadialGradient, TextAlign, TextBaseline,
};
pub use path::{Path2D, PathCommand};

// ==================== Errors ====================

/// Errors that can occur in canvas operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CanvasError {
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}
