//! SVG fonts named by `@font-face` rules.

use std::rc::Weak;

use tracing::debug;

use crate::document::Document;
use crate::resource::{ResourceHandle, ResourceKind};

/// Loads the `font` elements of an external SVG document into a family.
pub struct SvgFontLoader {
    document: Weak<Document>,
}

impl SvgFontLoader {
    pub fn new(document: Weak<Document>) -> Self {
        Self { document }
    }

    /// Fetch `url` and register every `font` it holds under `family`.
    ///
    /// The load is tracked by `doc`, so the document is not ready until it settles.
    pub fn load(&self, doc: &Document, family: &str, url: &str) -> ResourceHandle {
        let fetch = doc.loader().fetch_text(url);
        let document = self.document.clone();
        let family = family.to_string();

        let handle = ResourceHandle::spawn(url, ResourceKind::Font, async move {
            let text = fetch.await?;
            let markup = svgpaint_dom::Document::parse_xml(&text)?;
            let Some(document) = document.upgrade() else {
                return Ok(());
            };
            for node in markup.get_elements_by_tag_name("font") {
                let font = document.create_element(&node, None);
                debug!(family = %family, "Loaded SVG font");
                document.set_definition(family.clone(), font);
            }
            Ok(())
        });
        doc.add_font(handle.clone());
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementType;
    use crate::options::DocumentOptions;
    use crate::resource::{LoadState, ResourceLoader};
    use crate::SvgError;
    use futures::future::LocalBoxFuture;
    use futures::FutureExt;
    use std::rc::Rc;
    use svgpaint_canvas::ImageBitmap;

    struct FontLoader;

    impl ResourceLoader for FontLoader {
        fn fetch_text(&self, href: &str) -> LocalBoxFuture<'static, Result<String, SvgError>> {
            let result = match href.split('#').next() {
                Some("fonts.svg") => Ok(r#"<svg><defs><font horiz-adv-x="500">
                    <font-face font-family="Inner"/><glyph unicode="a" d="M0,0"/>
                    </font></defs></svg>"#
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
            let href = href.to_string();
            async move { Err(SvgError::Resource(href)) }.boxed_local()
        }
    }

    #[tokio::test]
    async fn test_font_face_rule_registers_family() {
        let doc = Document::parse(
            r#"<svg><style>@font-face { font-family: "Outer"; src: url("fonts.svg#f") format("svg"); }</style></svg>"#,
            DocumentOptions::default(),
            Rc::new(FontLoader),
        )
        .unwrap();
        assert_eq!(doc.fonts().len(), 1);
        assert!(!doc.is_fonts_loaded());

        doc.ready().await;
        assert!(doc.is_fonts_loaded());
        let font = doc.definition("Outer").unwrap();
        assert_eq!(font.kind, ElementType::Font);
        // The font-face inside still registers its own family.
        assert!(doc.definition("Inner").is_some());
    }

    #[tokio::test]
    async fn test_failed_font_settles() {
        let doc = Document::new(DocumentOptions::default(), Rc::new(FontLoader));
        let handle = SvgFontLoader::new(Rc::downgrade(&doc)).load(&doc, "Gone", "gone.svg");
        doc.ready().await;
        assert!(matches!(handle.state(), LoadState::Failed(_)));
        assert!(doc.definition("Gone").is_none());
    }
}
