//! Whole-document rendering through the public API.

use std::collections::HashMap;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use svgpaint::{
    DefaultResourceLoader, DocumentOptions, RenderOptions, ResourceLoader, SvgError, SvgRenderer,
};
use svgpaint_image::ImageConfig;
use svgpaint_net::FetchConfig;
use svgpaint_canvas::{CanvasRenderingContext2D, Color, DrawCommand, ImageBitmap, PaintStyle, PathCommand};
use svgpaint_common::{init_logging, LogConfig};

/// Serves documents and bitmaps from memory.
#[derive(Default)]
struct MemoryLoader {
    documents: HashMap<String, String>,
    images: HashMap<String, ImageBitmap>,
}

impl MemoryLoader {
    fn with_document(mut self, href: &str, text: &str) -> Self {
        self.documents.insert(href.to_string(), text.to_string());
        self
    }

    fn with_image(mut self, href: &str, width: u32, height: u32) -> Self {
        let id = self.images.len() as u64 + 1;
        self.images.insert(href.to_string(), ImageBitmap { id, width, height });
        self
    }
}

impl ResourceLoader for MemoryLoader {
    fn fetch_text(&self, href: &str) -> LocalBoxFuture<'static, Result<String, SvgError>> {
        let result = self
            .documents
            .get(href)
            .cloned()
            .ok_or_else(|| SvgError::Resource(format!("not found: {}", href)));
        async move { result }.boxed_local()
    }

    fn create_image(
        &self,
        href: &str,
        _anonymous_cross_origin: bool,
    ) -> LocalBoxFuture<'static, Result<ImageBitmap, SvgError>> {
        let result = self
            .images
            .get(href)
            .copied()
            .ok_or_else(|| SvgError::Resource(format!("not found: {}", href)));
        async move { result }.boxed_local()
    }
}

fn renderer(markup: &str, loader: MemoryLoader) -> SvgRenderer {
    init_logging(LogConfig::default().with_filter("svgpaint=debug"));
    SvgRenderer::from_string(markup, DocumentOptions::default(), Rc::new(loader)).unwrap()
}

fn fill_colors(commands: &[DrawCommand]) -> Vec<Color> {
    commands
        .iter()
        .filter_map(|command| match command {
            DrawCommand::FillPath {
                paint: PaintStyle::Color(color),
                ..
            } => Some(*color),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_stylesheet_and_inline_styles() {
    let svg = renderer(
        r##"<svg width="100" height="100">
          <style>
            rect { fill: red }
            .blue { fill: blue }
            #special { fill: lime }
          </style>
          <rect width="10" height="10"/>
          <rect class="blue" width="10" height="10"/>
          <rect id="special" class="blue" width="10" height="10"/>
          <rect id="inline" class="blue" style="fill: yellow" width="10" height="10"/>
        </svg>"##,
        MemoryLoader::default(),
    );
    let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
    svg.render(&mut ctx, &RenderOptions::default()).await;

    assert_eq!(
        fill_colors(ctx.commands()),
        vec![
            Color::from_rgb(255, 0, 0),
            Color::from_rgb(0, 0, 255),
            Color::from_rgb(0, 255, 0),
            Color::from_rgb(255, 255, 0),
        ]
    );
}

#[tokio::test]
async fn test_rules_declared_after_elements_apply() {
    let svg = renderer(
        r#"<svg><circle r="5"/><style>circle { fill: blue }</style></svg>"#,
        MemoryLoader::default(),
    );
    let mut ctx = CanvasRenderingContext2D::new(50.0, 50.0);
    svg.render(&mut ctx, &RenderOptions::default()).await;
    assert_eq!(fill_colors(ctx.commands()), vec![Color::from_rgb(0, 0, 255)]);
}

#[tokio::test]
async fn test_frames_are_repeatable() {
    let svg = renderer(
        r#"<svg width="40" height="40" viewBox="0 0 20 20" transform="translate(1,1)">
          <path d="M0,0 L10,0 L10,10 Z" stroke="black" stroke-width="2"/>
        </svg>"#,
        MemoryLoader::default(),
    );
    let options = RenderOptions {
        scale_width: Some(80.0),
        scale_height: Some(80.0),
        ..RenderOptions::default()
    };

    let mut first = CanvasRenderingContext2D::new(100.0, 100.0);
    svg.render(&mut first, &options).await;
    let mut second = CanvasRenderingContext2D::new(100.0, 100.0);
    svg.render_frame(&mut second, &options);

    assert_eq!(first.commands(), second.commands());
    assert_eq!(first.save_depth(), 0);
}

#[tokio::test]
async fn test_view_box_scales_content() {
    let svg = renderer(
        r#"<svg width="100" height="100" viewBox="0 0 10 10"><rect x="1" y="1" width="2" height="2"/></svg>"#,
        MemoryLoader::default(),
    );
    let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
    svg.render(&mut ctx, &RenderOptions::default()).await;

    let path = ctx
        .commands()
        .iter()
        .find_map(|command| match command {
            DrawCommand::FillPath { path, .. } => Some(path.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(path[0], PathCommand::MoveTo { x: 10.0, y: 10.0 });
    assert_eq!(path[1], PathCommand::LineTo { x: 30.0, y: 10.0 });
}

#[tokio::test]
async fn test_images_load_before_render() {
    let loader = MemoryLoader::default()
        .with_image("photo.png", 10, 10)
        .with_document(
            "badge.svg",
            r#"<svg width="4" height="4"><rect width="4" height="4" fill="green"/></svg>"#,
        );
    let svg = renderer(
        r#"<svg xmlns:xlink="http://www.w3.org/1999/xlink">
          <image width="10" height="10" xlink:href="photo.png"/>
          <image x="20" width="8" height="8" href="badge.svg"/>
          <image x="40" width="8" height="8" href="missing.png"/>
        </svg>"#,
        loader,
    );
    assert!(!svg.is_ready());

    let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
    svg.render(&mut ctx, &RenderOptions::default()).await;
    assert!(svg.is_ready());
    assert!(svg.document().is_images_loaded());

    let images = ctx
        .commands()
        .iter()
        .filter(|command| matches!(command, DrawCommand::DrawImage { .. }))
        .count();
    assert_eq!(images, 1);
    assert_eq!(fill_colors(ctx.commands()), vec![Color::from_rgb(0, 128, 0)]);
}

/// A 3x2 opaque red PNG.
const RED_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAMAAAACCAYAAACddGYaAAAAEUlEQVR4nGP4z8DwH4YZkDkAm34L9XKwuTwAAAAASUVORK5CYII=";

#[tokio::test]
async fn test_data_url_png_through_default_loader() {
    let loader = DefaultResourceLoader::new(FetchConfig::default(), ImageConfig::default()).unwrap();
    let markup = format!(
        r#"<svg width="20" height="20"><image x="5" y="5" width="6" height="4" href="data:image/png;base64,{}"/></svg>"#,
        RED_PNG
    );
    let svg = SvgRenderer::from_string(&markup, DocumentOptions::default(), Rc::new(loader)).unwrap();

    let mut ctx = CanvasRenderingContext2D::new(20.0, 20.0);
    svg.render(&mut ctx, &RenderOptions::default()).await;
    assert!(svg.document().is_images_loaded());

    let drawn: Vec<_> = ctx
        .commands()
        .iter()
        .filter_map(|command| match command {
            DrawCommand::DrawImage { image, transform, .. } => Some((*image, *transform)),
            _ => None,
        })
        .collect();
    assert_eq!(drawn.len(), 1);
    let (bitmap, transform) = drawn[0];
    assert_eq!((bitmap.width, bitmap.height), (3, 2));
    assert_eq!(transform.apply(0.0, 0.0), (5.0, 5.0));
    assert_eq!(transform.apply(3.0, 2.0), (11.0, 9.0));
}

#[tokio::test]
async fn test_from_url() {
    let loader = MemoryLoader::default().with_document("scene.svg", r#"<svg><rect width="3" height="3"/></svg>"#);
    let svg = SvgRenderer::from_url("scene.svg", DocumentOptions::default(), Rc::new(loader))
        .await
        .unwrap();
    assert_eq!(svg.root().unwrap().child_count(), 1);

    let missing = SvgRenderer::from_url("other.svg", DocumentOptions::default(), Rc::new(MemoryLoader::default())).await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn test_gradient_fill() {
    let svg = renderer(
        r##"<svg>
          <defs>
            <linearGradient id="g"><stop offset="0" stop-color="red"/><stop offset="1" stop-color="blue"/></linearGradient>
          </defs>
          <rect width="10" height="10" fill="url(#g)"/>
        </svg>"##,
        MemoryLoader::default(),
    );
    let mut ctx = CanvasRenderingContext2D::new(50.0, 50.0);
    svg.render(&mut ctx, &RenderOptions::default()).await;
    let gradient = ctx.commands().iter().any(|command| {
        matches!(
            command,
            DrawCommand::FillPath {
                paint: PaintStyle::LinearGradient(_),
                ..
            }
        )
    });
    assert!(gradient);
}

#[test]
fn test_render_options_from_json() {
    let options: RenderOptions =
        serde_json::from_str(r#"{"ignore_clear": true, "scale_width": 64, "document": {"em_size": 16}}"#).unwrap();
    assert!(options.ignore_clear);
    assert_eq!(options.scale_width, Some(64.0));
    assert_eq!(options.document.em_size, 16.0);
    assert_eq!(options.document.root_em_size, 12.0);
}
