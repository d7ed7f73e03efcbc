//! `image` elements: raster bitmaps and embedded SVG documents.

use std::cell::RefCell;
use std::rc::Rc;

use svgpaint_canvas::{ImageBitmap, RenderingContext2D};
use svgpaint_net::DataUrl;
use tracing::{debug, trace};

use crate::document::Document;
use crate::element::Element;
use crate::geometry::BoundingBox;
use crate::options::RenderOptions;
use crate::renderer::SvgRenderer;
use crate::resource::{ResourceHandle, ResourceKind};
use crate::screen::{Axis, ViewBox};

/// What an image element ended up holding.
#[derive(Default)]
pub enum ImageContent {
    /// Still loading, or the load failed.
    #[default]
    None,
    Raster(ImageBitmap),
    Svg(SvgRenderer),
}

/// Load handle and content of an `image` element.
pub struct ImageState {
    handle: ResourceHandle,
    content: Rc<RefCell<ImageContent>>,
}

impl ImageState {
    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    pub fn is_loaded(&self) -> bool {
        !matches!(*self.content.borrow(), ImageContent::None)
    }

    pub fn is_svg(&self) -> bool {
        matches!(*self.content.borrow(), ImageContent::Svg(_))
    }
}

/// Whether `href` names an SVG document rather than a raster image.
pub fn is_svg_href(href: &str) -> bool {
    let href = href.trim();
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.to_ascii_lowercase().ends_with(".svg")
        || href.to_ascii_lowercase().starts_with("data:image/svg+xml")
}

/// Start loading the image an element references and register it with the document.
pub fn start_load(doc: &Document, element: &Rc<Element>) {
    let href = element.get_href_attribute(doc);
    if !href.has_value() {
        trace!("Image without href");
        return;
    }
    let href = href.get_string().trim().to_string();
    let content = Rc::new(RefCell::new(ImageContent::None));
    let slot = Rc::clone(&content);

    let handle = if is_svg_href(&href) {
        let loader = doc.loader();
        let options = doc.options().clone();
        let host = Rc::downgrade(element);
        let source = href.clone();
        ResourceHandle::spawn(href, ResourceKind::Document, async move {
            let text = if source.starts_with("data:") {
                DataUrl::parse(&source)?.text()
            } else {
                loader.fetch_text(&source).await?
            };
            let renderer = SvgRenderer::from_string(&text, options, loader)?;
            if let Some(root) = renderer.root() {
                root.set_parent(host);
            }
            renderer.ready().await;
            *slot.borrow_mut() = ImageContent::Svg(renderer);
            Ok(())
        })
    } else {
        let anonymous = doc.options().anonymous_cross_origin.unwrap_or(false);
        let image = doc.loader().create_image(&href, anonymous);
        ResourceHandle::spawn(href, ResourceKind::Image, async move {
            let bitmap = image.await?;
            *slot.borrow_mut() = ImageContent::Raster(bitmap);
            Ok(())
        })
    };

    doc.add_image(handle.clone());
    *element.image.borrow_mut() = Some(ImageState { handle, content });
}

/// Draw the loaded content into the element's box. Nothing is drawn until it loads.
pub fn render_image(element: &Element, doc: &Document, ctx: &mut dyn RenderingContext2D) {
    let state = element.image.borrow();
    let Some(state) = state.as_ref() else {
        return;
    };

    let x = element.get_attribute(doc, "x").get_pixels(Some(Axis::X), false);
    let y = element.get_attribute(doc, "y").get_pixels(Some(Axis::Y), false);
    let width = element.get_style(doc, "width", true).get_pixels(Some(Axis::X), false);
    let height = element.get_style(doc, "height", true).get_pixels(Some(Axis::Y), false);
    if width == 0.0 || height == 0.0 {
        return;
    }

    let content = state.content.borrow();
    match &*content {
        ImageContent::None => {
            debug!(href = state.handle.href(), "Image not loaded, skipping");
        }
        ImageContent::Svg(renderer) => {
            ctx.save();
            ctx.translate(x, y);
            renderer.render_frame(ctx, &RenderOptions::embedded(width, height));
            ctx.restore();
        }
        ImageContent::Raster(bitmap) => {
            ctx.save();
            ctx.translate(x, y);
            doc.screen.set_view_box(
                ctx,
                &ViewBox {
                    aspect_ratio: element.get_attribute(doc, "preserveAspectRatio").get_string(),
                    width,
                    desired_width: f64::from(bitmap.width),
                    height,
                    desired_height: f64::from(bitmap.height),
                    min_x: 0.0,
                    min_y: 0.0,
                    reference: None,
                    clip: false,
                    clip_x: 0.0,
                    clip_y: 0.0,
                },
            );
            ctx.draw_image(bitmap, 0.0, 0.0);
            ctx.restore();
        }
    }
}

pub fn bounding_box(element: &Element, doc: &Document) -> BoundingBox {
    let x = element.get_attribute(doc, "x").get_pixels(Some(Axis::X), false);
    let y = element.get_attribute(doc, "y").get_pixels(Some(Axis::Y), false);
    let width = element.get_style(doc, "width", true).get_pixels(Some(Axis::X), false);
    let height = element.get_style(doc, "height", true).get_pixels(Some(Axis::Y), false);
    BoundingBox::from_corners(x, y, x + width, y + height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DocumentOptions;
    use crate::resource::{LoadState, ResourceLoader};
    use crate::SvgError;
    use futures::future::LocalBoxFuture;
    use futures::FutureExt;
    use svgpaint_canvas::{CanvasRenderingContext2D, DrawCommand, PathCommand};

    /// Serves one SVG document and a fixed 20x10 bitmap for every other image.
    struct FixtureLoader;

    impl ResourceLoader for FixtureLoader {
        fn fetch_text(&self, href: &str) -> LocalBoxFuture<'static, Result<String, SvgError>> {
            let result = match href {
                "inner.svg" => Ok(r#"<svg width="10" height="10"><rect width="10" height="10" fill="blue"/></svg>"#
                    .to_string()),
                _ => Err(SvgError::Resource(href.to_string())),
            };
            async move { result }.boxed_local()
        }

        fn create_image(
            &self,
            href: &str,
            _anonymous_cross_origin: bool,
        ) -> LocalBoxFuture<'static, Result<ImageBitmap, SvgError>> {
            let result = if href.ends_with(".png") {
                Ok(ImageBitmap {
                    id: 7,
                    width: 20,
                    height: 10,
                })
            } else {
                Err(SvgError::Resource(href.to_string()))
            };
            async move { result }.boxed_local()
        }
    }

    async fn load(markup: &str) -> Rc<Document> {
        let doc = Document::parse(markup, DocumentOptions::default(), Rc::new(FixtureLoader)).unwrap();
        doc.ready().await;
        doc
    }

    #[test]
    fn test_is_svg_href() {
        assert!(is_svg_href("icons/a.svg"));
        assert!(is_svg_href("a.SVG?v=2"));
        assert!(is_svg_href("data:image/svg+xml;base64,PHN2Zy8+"));
        assert!(!is_svg_href("photo.png"));
    }

    #[tokio::test]
    async fn test_raster_image_fits_box() {
        let doc = load(r#"<svg><image x="5" y="5" width="40" height="40" href="a.png"/></svg>"#).await;
        assert!(doc.is_images_loaded());

        let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
        doc.render_frame(&mut ctx, &RenderOptions::default());
        let draw = ctx
            .commands()
            .iter()
            .find_map(|command| match command {
                DrawCommand::DrawImage { image, transform, .. } => Some((*image, *transform)),
                _ => None,
            })
            .unwrap();
        assert_eq!(draw.0.id, 7);
        // 20x10 meets a 40x40 box at scale 2, centred vertically.
        let (x, y) = draw.1.apply(0.0, 0.0);
        assert_eq!((x, y), (5.0, 15.0));
        let (x, _) = draw.1.apply(20.0, 0.0);
        assert_eq!(x, 45.0);
    }

    #[tokio::test]
    async fn test_embedded_svg_renders_scaled() {
        let doc = load(r#"<svg><image x="10" y="0" width="20" height="20" href="inner.svg"/></svg>"#).await;
        let root = doc.document_element().unwrap();
        let image = root.children()[0].clone();
        assert!(image.image.borrow().as_ref().unwrap().is_svg());

        let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
        doc.render_frame(&mut ctx, &RenderOptions::default());
        let path = ctx
            .commands()
            .iter()
            .find_map(|command| match command {
                DrawCommand::FillPath { path, .. } => Some(path.clone()),
                _ => None,
            })
            .unwrap();
        // Inner 10x10 scaled to the 20x20 box at (10, 0).
        assert_eq!(path[0], PathCommand::MoveTo { x: 10.0, y: 0.0 });
        assert_eq!(path[1], PathCommand::LineTo { x: 30.0, y: 0.0 });
        assert_eq!(ctx.save_depth(), 0);
    }

    #[tokio::test]
    async fn test_embedded_data_url() {
        let doc = load(
            r#"<svg><image width="10" height="10" href="data:image/svg+xml,%3Csvg%3E%3Ccircle r='2'/%3E%3C/svg%3E"/></svg>"#,
        )
        .await;
        let image = doc.document_element().unwrap().children()[0].clone();
        let state = image.image.borrow();
        let state = state.as_ref().unwrap();
        assert_eq!(state.handle().state(), LoadState::Complete);
        assert!(state.is_svg());
    }

    #[tokio::test]
    async fn test_failed_image_draws_nothing() {
        let doc = load(r#"<svg><image width="10" height="10" href="missing.jpg"/></svg>"#).await;
        let image = doc.document_element().unwrap().children()[0].clone();
        assert!(matches!(
            image.image.borrow().as_ref().unwrap().handle().state(),
            LoadState::Failed(_)
        ));

        let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
        doc.render_frame(&mut ctx, &RenderOptions::default());
        assert!(!ctx
            .commands()
            .iter()
            .any(|command| matches!(command, DrawCommand::DrawImage { .. })));
    }

    #[test]
    fn test_bounding_box() {
        let doc = Document::parse(
            r#"<svg><image x="1" y="2" width="3" height="4" href="a.png"/></svg>"#,
            DocumentOptions::default(),
            Rc::new(FixtureLoader),
        )
        .unwrap();
        let image = doc.document_element().unwrap().children()[0].clone();
        let bounds = bounding_box(&image, &doc);
        assert_eq!((bounds.x(), bounds.y(), bounds.x2(), bounds.y2()), (1.0, 2.0, 4.0, 6.0));
    }
}
