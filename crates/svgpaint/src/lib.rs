//! # svgpaint
//!
//! An SVG document model and renderer that paints onto a canvas-style 2D surface.
//!
//! ## Design Goals
//!
//! 1. **Surface agnostic**: every draw goes through [`svgpaint_canvas::RenderingContext2D`]
//! 2. **Never fatal**: bad values fall back to defaults, failed loads render as absent
//! 3. **Settled before drawn**: images, fonts and embedded documents load before a frame
//!
//! ## Architecture
//!
//! ```text
//! SvgRenderer
//!    └── Document
//!           ├── Element tree (ElementType + attributes + cascaded styles)
//!           ├── StyleRegistry (<style> rules by specificity)
//!           ├── Definitions (id -> Element)
//!           ├── Em-size scopes
//!           └── Screen
//!                  ├── ViewPort stack
//!                  └── LoadBarrier (ResourceHandles)
//! ```

pub mod barrier;
pub mod document;
pub mod element;
pub mod font_loader;
pub mod geometry;
pub mod image;
pub mod options;
pub mod paint;
pub mod path_parser;
pub mod property;
pub mod render;
pub mod renderer;
pub mod resource;
pub mod screen;
pub mod shapes;
pub mod style;
pub mod text;
pub mod transform;
pub mod util;

use svgpaint_dom::DomError;
use svgpaint_image::ImageError;
use svgpaint_net::NetError;
use thiserror::Error;

pub use document::{Document, EmSizeGuard};
pub use element::{Element, ElementType};
pub use geometry::{BoundingBox, Point};
pub use options::{DocumentOptions, RenderOptions};
pub use path_parser::PathParser;
pub use property::Property;
pub use render::RenderScope;
pub use renderer::SvgRenderer;
pub use resource::{DefaultResourceLoader, LoadState, ResourceHandle, ResourceKind, ResourceLoader};
pub use screen::{Axis, Screen, ViewPort};
pub use transform::{Transform, TransformOp};

/// Errors that can occur while loading or rendering a document.
#[derive(Error, Debug)]
pub enum SvgError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Markup error: {0}")]
    Dom(#[from] DomError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] NetError),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("Resource error: {0}")]
    Resource(String),
}
