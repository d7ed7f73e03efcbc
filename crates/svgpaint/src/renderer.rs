//! Public entry point: build a document from markup and draw it onto a context.

use std::rc::Rc;

use svgpaint_canvas::RenderingContext2D;
use tracing::{debug, info};

use crate::document::Document;
use crate::element::Element;
use crate::options::{DocumentOptions, RenderOptions};
use crate::resource::ResourceLoader;
use crate::SvgError;

/// A parsed SVG document ready to be drawn, possibly many times.
///
/// ```no_run
/// # use std::rc::Rc;
/// # use svgpaint::{DefaultResourceLoader, DocumentOptions, RenderOptions, SvgRenderer};
/// # use svgpaint_canvas::CanvasRenderingContext2D;
/// # async fn draw(loader: Rc<DefaultResourceLoader>) -> Result<(), svgpaint::SvgError> {
/// let renderer = SvgRenderer::from_string("<svg><rect width='5' height='5'/></svg>",
///     DocumentOptions::default(), loader)?;
/// let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
/// renderer.render(&mut ctx, &RenderOptions::default()).await;
/// # Ok(())
/// # }
/// ```
pub struct SvgRenderer {
    document: Rc<Document>,
}

impl SvgRenderer {
    /// Parse markup. Loads the document references start now and settle in [`ready`](Self::ready).
    pub fn from_string(
        text: &str,
        options: DocumentOptions,
        loader: Rc<dyn ResourceLoader>,
    ) -> Result<Self, SvgError> {
        let document = Document::parse(text, options, loader)?;
        Ok(Self { document })
    }

    /// Fetch markup through the loader, then parse it.
    pub async fn from_url(
        url: &str,
        options: DocumentOptions,
        loader: Rc<dyn ResourceLoader>,
    ) -> Result<Self, SvgError> {
        info!(url, "Loading SVG document");
        let text = loader.fetch_text(url).await?;
        Self::from_string(&text, options, loader)
    }

    /// A renderer for other markup sharing this one's options and loader.
    pub fn fork_string(&self, text: &str) -> Result<Self, SvgError> {
        Self::from_string(text, self.document.options().clone(), self.document.loader())
    }

    /// Fetch another document sharing this one's options and loader.
    pub async fn fork_url(&self, url: &str) -> Result<Self, SvgError> {
        Self::from_url(url, self.document.options().clone(), self.document.loader()).await
    }

    /// Wait until every image, font and embedded document has settled.
    pub async fn ready(&self) {
        self.document.ready().await;
    }

    pub fn is_ready(&self) -> bool {
        self.document.screen.is_ready()
    }

    /// Wait for pending loads, then draw one frame.
    pub async fn render(&self, ctx: &mut dyn RenderingContext2D, options: &RenderOptions) {
        self.ready().await;
        debug!("Resources settled");
        self.render_frame(ctx, options);
    }

    /// Draw one frame with whatever has loaded so far.
    pub fn render_frame(&self, ctx: &mut dyn RenderingContext2D, options: &RenderOptions) {
        self.document.render_frame(ctx, options);
    }

    pub fn document(&self) -> &Rc<Document> {
        &self.document
    }

    pub fn root(&self) -> Option<Rc<Element>> {
        self.document.document_element()
    }
}
