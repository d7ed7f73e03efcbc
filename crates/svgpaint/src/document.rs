//! The document: element construction, definitions, styles, em scopes and loads.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use futures::future::join_all;
use futures::FutureExt;
use svgpaint_dom::Node;
use tracing::{debug, trace, warn};

use crate::element::{Element, ElementType};
use crate::font_loader::SvgFontLoader;
use crate::image;
use crate::options::DocumentOptions;
use crate::resource::{ResourceHandle, ResourceLoader};
use crate::screen::Screen;
use crate::style::StyleRegistry;
use crate::text;
use crate::SvgError;

/// Restores the em size when dropped.
#[must_use = "the em size is popped when the guard is dropped"]
pub struct EmSizeGuard<'d> {
    document: &'d Document,
}

impl Drop for EmSizeGuard<'_> {
    fn drop(&mut self) {
        self.document.em_sizes.borrow_mut().pop();
    }
}

/// Render root owning the element tree and everything shared across it.
pub struct Document {
    self_ref: Weak<Document>,
    options: DocumentOptions,
    pub screen: Screen,
    loader: Rc<dyn ResourceLoader>,
    em_sizes: RefCell<Vec<f64>>,
    definitions: RefCell<HashMap<String, Rc<Element>>>,
    styles: RefCell<StyleRegistry>,
    images: Rc<RefCell<Vec<ResourceHandle>>>,
    fonts: Rc<RefCell<Vec<ResourceHandle>>>,
    unique_id: Cell<u64>,
    document_element: RefCell<Option<Rc<Element>>>,
    /// Root transform as parsed, before any frame scaling.
    base_transform: RefCell<String>,
    /// Root sizing attributes as parsed, restored before every frame.
    base_attributes: RefCell<Vec<(&'static str, Option<String>)>>,
}

/// Root attributes a frame may overwrite.
const FRAME_ATTRIBUTES: [&str; 4] = ["x", "y", "width", "height"];

impl Document {
    /// An empty document whose barrier waits on every image and font it registers.
    pub fn new(options: DocumentOptions, loader: Rc<dyn ResourceLoader>) -> Rc<Self> {
        let document = Rc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            em_sizes: RefCell::new(vec![options.em_size]),
            options,
            screen: Screen::new(),
            loader,
            definitions: RefCell::new(HashMap::new()),
            styles: RefCell::new(StyleRegistry::new()),
            images: Rc::new(RefCell::new(Vec::new())),
            fonts: Rc::new(RefCell::new(Vec::new())),
            unique_id: Cell::new(0),
            document_element: RefCell::new(None),
            base_transform: RefCell::new(String::new()),
            base_attributes: RefCell::new(Vec::new()),
        });

        let barrier = document.screen.barrier();
        for handles in [&document.images, &document.fonts] {
            let predicate_handles = Rc::clone(handles);
            barrier.wait(move || predicate_handles.borrow().iter().all(ResourceHandle::is_loaded));

            let future_handles = Rc::clone(handles);
            barrier.wait_future(move || {
                let pending: Vec<_> = future_handles
                    .borrow()
                    .iter()
                    .map(ResourceHandle::completion)
                    .collect();
                join_all(pending).map(|_| ()).boxed_local()
            });
        }

        document
    }

    /// Parse markup into a document rooted at its top element.
    pub fn parse(
        text: &str,
        options: DocumentOptions,
        loader: Rc<dyn ResourceLoader>,
    ) -> Result<Rc<Self>, SvgError> {
        let dom = svgpaint_dom::Document::parse_xml(text)?;
        let root_node = dom
            .document_element()
            .ok_or_else(|| SvgError::ParseError("document has no root element".to_string()))?;

        let document = Self::new(options, loader);
        let root = document.create_element(&root_node, None);
        root.set_root(true);
        document.reapply_styles(&root);
        *document.base_transform.borrow_mut() =
            root.get_style(&document, "transform", true).get_string().to_string();
        *document.base_attributes.borrow_mut() = FRAME_ATTRIBUTES
            .iter()
            .map(|name| (*name, root.raw_attribute(name)))
            .collect();
        *document.document_element.borrow_mut() = Some(root);

        debug!(
            definitions = document.definitions.borrow().len(),
            rules = document.styles.borrow().len(),
            images = document.images.borrow().len(),
            fonts = document.fonts.borrow().len(),
            "Document built"
        );
        Ok(document)
    }

    /// Build an element and its subtree from a markup node.
    pub fn create_element(&self, node: &Rc<Node>, parent: Option<&Rc<Element>>) -> Rc<Element> {
        let tag = node.tag_name().unwrap_or_default();
        let kind = ElementType::from_tag(tag);
        let element = Rc::new(Element::new(kind, tag));
        if let Some(parent) = parent {
            element.set_parent(Rc::downgrade(parent));
        }

        for (name, value) in node.attributes() {
            element.set_attribute(name, value.as_str());
        }
        self.apply_stylesheet(&element);
        if let Some(style) = element.raw_attribute("style") {
            element.apply_inline_style(&style);
        }
        if let Some(id) = element.raw_attribute("id").filter(|id| !id.is_empty()) {
            self.definitions
                .borrow_mut()
                .entry(id)
                .or_insert_with(|| Rc::clone(&element));
        }

        match kind {
            ElementType::Style => self.add_stylesheet(&node.text_content()),
            ElementType::Image => image::start_load(self, &element),
            _ => {}
        }

        for child in node.children() {
            if child.is_element() {
                if child.tag_name() == Some("title") {
                    continue;
                }
                let child = self.create_element(&child, Some(&element));
                element.push_child(child);
            } else if let Some(text) = child.text().filter(|_| kind.captures_text()) {
                if !text.is_empty() {
                    let text_node = Element::text_node(text);
                    text_node.set_parent(Rc::downgrade(&element));
                    element.push_child(text_node);
                }
            }
        }

        if kind == ElementType::Font {
            text::register_font(self, &element);
        }

        element
    }

    fn apply_stylesheet(&self, element: &Element) {
        let styles = self.styles.borrow();
        if styles.is_empty() {
            return;
        }
        for rule in styles.matching(element) {
            element.apply_style_rule(rule);
        }
    }

    /// Apply the stylesheet to a whole subtree, reaching elements declared before a rule.
    pub fn reapply_styles(&self, root: &Rc<Element>) {
        if self.styles.borrow().is_empty() {
            return;
        }
        root.for_each_descendant(&mut |element| self.apply_stylesheet(element));
    }

    /// Register CSS rules and start any SVG font loads they request.
    pub fn add_stylesheet(&self, css: &str) {
        let fonts = self.styles.borrow_mut().parse_stylesheet(css);
        for request in fonts {
            SvgFontLoader::new(self.self_ref.clone()).load(self, &request.family, &request.url);
        }
    }

    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    pub fn loader(&self) -> Rc<dyn ResourceLoader> {
        Rc::clone(&self.loader)
    }

    pub fn document_element(&self) -> Option<Rc<Element>> {
        self.document_element.borrow().clone()
    }

    pub(crate) fn base_transform(&self) -> String {
        self.base_transform.borrow().clone()
    }

    /// Put the root's sizing attributes back to their parsed values.
    pub(crate) fn restore_frame_attributes(&self, root: &Element) {
        for (name, value) in self.base_attributes.borrow().iter() {
            match value {
                Some(value) => root.set_attribute(*name, value.as_str()),
                None => root.remove_attribute(name),
            }
        }
    }

    pub fn root_em_size(&self) -> f64 {
        self.options.root_em_size
    }

    /// Current em size: the innermost scope.
    pub fn em_size(&self) -> f64 {
        self.em_sizes
            .borrow()
            .last()
            .copied()
            .unwrap_or(self.options.em_size)
    }

    /// Enter an em scope that lasts until the guard drops.
    pub fn push_em_size(&self, size: f64) -> EmSizeGuard<'_> {
        trace!(size, "Push em size");
        self.em_sizes.borrow_mut().push(size);
        EmSizeGuard { document: self }
    }

    pub fn em_depth(&self) -> usize {
        self.em_sizes.borrow().len()
    }

    pub fn definition(&self, name: &str) -> Option<Rc<Element>> {
        self.definitions.borrow().get(name).cloned()
    }

    pub fn set_definition(&self, name: impl Into<String>, element: Rc<Element>) {
        self.definitions.borrow_mut().insert(name.into(), element);
    }

    pub fn definition_count(&self) -> usize {
        self.definitions.borrow().len()
    }

    pub fn with_styles<R>(&self, f: impl FnOnce(&StyleRegistry) -> R) -> R {
        f(&self.styles.borrow())
    }

    /// Track an image or embedded document load.
    pub fn add_image(&self, handle: ResourceHandle) {
        self.images.borrow_mut().push(handle);
    }

    pub fn add_font(&self, handle: ResourceHandle) {
        self.fonts.borrow_mut().push(handle);
    }

    pub fn images(&self) -> Vec<ResourceHandle> {
        self.images.borrow().clone()
    }

    pub fn fonts(&self) -> Vec<ResourceHandle> {
        self.fonts.borrow().clone()
    }

    pub fn is_images_loaded(&self) -> bool {
        self.images.borrow().iter().all(ResourceHandle::is_loaded)
    }

    pub fn is_fonts_loaded(&self) -> bool {
        self.fonts.borrow().iter().all(ResourceHandle::is_loaded)
    }

    /// A fresh identifier, unique within this document.
    pub fn get_unique_id(&self) -> String {
        let id = self.unique_id.get() + 1;
        self.unique_id.set(id);
        format!("svgpaint{}", id)
    }

    /// Wait until every registered load has settled.
    pub async fn ready(&self) {
        self.screen.ready().await;
        if !self.is_images_loaded() || !self.is_fonts_loaded() {
            warn!("Barrier released with loads outstanding");
        }
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("options", &self.options)
            .field("root", &self.document_element.borrow())
            .field("em_depth", &self.em_depth())
            .finish()
    }
}
