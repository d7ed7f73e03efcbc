//! Element tree nodes: kinds, attributes and cascaded styles.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use lazy_static::lazy_static;

use crate::document::Document;
use crate::image::ImageState;
use crate::property::Property;
use crate::style::{matches_selector, StyleRule};

/// The closed set of element kinds, chosen from the tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Svg,
    G,
    Defs,
    Path,
    Rect,
    Circle,
    Ellipse,
    Line,
    Polyline,
    Polygon,
    Text,
    TSpan,
    TextNode,
    Image,
    Style,
    LinearGradient,
    RadialGradient,
    Stop,
    Pattern,
    Marker,
    ClipPath,
    Font,
    FontFace,
    Glyph,
    MissingGlyph,
    Unknown,
}

lazy_static! {
    static ref ELEMENT_TYPES: HashMap<&'static str, ElementType> = {
        use ElementType::*;
        HashMap::from([
            ("svg", Svg),
            ("g", G),
            ("a", G),
            ("defs", Defs),
            ("path", Path),
            ("rect", Rect),
            ("circle", Circle),
            ("ellipse", Ellipse),
            ("line", Line),
            ("polyline", Polyline),
            ("polygon", Polygon),
            ("text", Text),
            ("tspan", TSpan),
            ("image", Image),
            ("style", Style),
            ("linearGradient", LinearGradient),
            ("radialGradient", RadialGradient),
            ("stop", Stop),
            ("pattern", Pattern),
            ("marker", Marker),
            ("clipPath", ClipPath),
            ("font", Font),
            ("font-face", FontFace),
            ("glyph", Glyph),
            ("missing-glyph", MissingGlyph),
        ])
    };
}

impl ElementType {
    /// Kind for a tag name; unknown names map to `Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        ELEMENT_TYPES.get(tag).copied().unwrap_or(ElementType::Unknown)
    }

    /// Kinds that draw nothing when walked directly.
    pub fn is_non_rendering(&self) -> bool {
        use ElementType::*;
        matches!(
            self,
            Defs | Style
                | LinearGradient
                | RadialGradient
                | Stop
                | Pattern
                | Marker
                | ClipPath
                | Font
                | FontFace
                | Glyph
                | MissingGlyph
        )
    }

    /// Kinds whose geometry comes from `build_path`.
    pub fn is_shape(&self) -> bool {
        use ElementType::*;
        matches!(
            self,
            Path | Rect | Circle | Ellipse | Line | Polyline | Polygon | Glyph | MissingGlyph
        )
    }

    /// Kinds that keep their text children.
    pub fn captures_text(&self) -> bool {
        matches!(self, ElementType::Text | ElementType::TSpan)
    }
}

/// A style value and the specificity of the rule that set it. `None` marks an inline
/// declaration, which rules never override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleEntry {
    pub value: String,
    pub specificity: Option<String>,
}

/// A node of the render tree.
pub struct Element {
    pub kind: ElementType,
    tag: String,
    attributes: RefCell<HashMap<String, String>>,
    styles: RefCell<HashMap<String, StyleEntry>>,
    parent: RefCell<Weak<Element>>,
    children: RefCell<Vec<Rc<Element>>>,
    text: Option<String>,
    root: Cell<bool>,
    pub(crate) image: RefCell<Option<ImageState>>,
}

impl Element {
    pub fn new(kind: ElementType, tag: impl Into<String>) -> Self {
        Self {
            kind,
            tag: tag.into(),
            attributes: RefCell::new(HashMap::new()),
            styles: RefCell::new(HashMap::new()),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            text: None,
            root: Cell::new(false),
            image: RefCell::new(None),
        }
    }

    /// A text run inside `text` or `tspan`.
    pub fn text_node(text: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            text: Some(text.into()),
            ..Self::new(ElementType::TextNode, "#text")
        })
    }

    /// An element built in code rather than parsed, sharing existing children.
    ///
    /// The children keep their own parents.
    pub fn synthetic(
        kind: ElementType,
        tag: &str,
        attributes: Vec<(&str, String)>,
        children: Vec<Rc<Element>>,
    ) -> Rc<Self> {
        let element = Self::new(kind, tag);
        {
            let mut map = element.attributes.borrow_mut();
            for (name, value) in attributes {
                map.insert(name.to_string(), value);
            }
        }
        *element.children.borrow_mut() = children;
        Rc::new(element)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.root.get()
    }

    pub fn set_root(&self, root: bool) {
        self.root.set(root);
    }

    pub fn parent(&self) -> Option<Rc<Element>> {
        self.parent.borrow().upgrade()
    }

    /// Point the parent link at `parent` without taking ownership.
    pub fn set_parent(&self, parent: Weak<Element>) {
        *self.parent.borrow_mut() = parent;
    }

    pub fn children(&self) -> Vec<Rc<Element>> {
        self.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    pub fn push_child(&self, child: Rc<Element>) {
        self.children.borrow_mut().push(child);
    }

    pub fn raw_attribute(&self, name: &str) -> Option<String> {
        self.attributes.borrow().get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.borrow().contains_key(name)
    }

    pub fn get_attribute<'d>(&self, document: &'d Document, name: &str) -> Property<'d> {
        Property::new(document, name, self.raw_attribute(name))
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        self.attributes
            .borrow_mut()
            .insert(name.to_string(), value.into());
    }

    pub fn remove_attribute(&self, name: &str) {
        self.attributes.borrow_mut().remove(name);
    }

    /// `href`, or any namespaced `*:href`.
    pub fn get_href_attribute<'d>(&self, document: &'d Document) -> Property<'d> {
        let attributes = self.attributes.borrow();
        let value = attributes.get("href").cloned().or_else(|| {
            attributes
                .iter()
                .find(|(name, _)| name.ends_with(":href"))
                .map(|(_, value)| value.clone())
        });
        Property::new(document, "href", value)
    }

    /// Cascaded style value: own style, then attribute, then the parent chain.
    pub fn get_style<'d>(&self, document: &'d Document, name: &str, skip_ancestors: bool) -> Property<'d> {
        if let Some(entry) = self.styles.borrow().get(name) {
            return Property::new(document, name, Some(entry.value.clone()));
        }
        if let Some(value) = self.raw_attribute(name).filter(|v| !v.is_empty()) {
            return Property::new(document, name, Some(value));
        }
        if !skip_ancestors {
            if let Some(parent) = self.parent() {
                let inherited = parent.get_style(document, name, false);
                if inherited.has_value() {
                    return inherited;
                }
            }
        }
        Property::empty(document, name)
    }

    /// Set an inline style value.
    pub fn set_style(&self, name: &str, value: impl Into<String>) {
        self.styles.borrow_mut().insert(
            name.to_string(),
            StyleEntry {
                value: value.into(),
                specificity: None,
            },
        );
    }

    pub fn remove_style(&self, name: &str) {
        self.styles.borrow_mut().remove(name);
    }

    pub fn style_entry(&self, name: &str) -> Option<StyleEntry> {
        self.styles.borrow().get(name).cloned()
    }

    /// Parse a `style` attribute into inline declarations.
    pub fn apply_inline_style(&self, style: &str) {
        for declaration in style.split(';').map(str::trim) {
            let Some((name, value)) = declaration.split_once(':') else {
                continue;
            };
            let name = name.trim();
            if !name.is_empty() {
                self.set_style(name, value.trim());
            }
        }
    }

    /// Take each declaration of `rule` unless a stronger or inline one is already set.
    pub fn apply_style_rule(&self, rule: &StyleRule) {
        let mut styles = self.styles.borrow_mut();
        for (name, value) in &rule.properties {
            let wins = match styles.get(name) {
                None => true,
                Some(StyleEntry {
                    specificity: Some(existing),
                    ..
                }) => rule.specificity >= *existing,
                Some(StyleEntry {
                    specificity: None, ..
                }) => false,
            };
            if wins {
                styles.insert(
                    name.clone(),
                    StyleEntry {
                        value: value.clone(),
                        specificity: Some(rule.specificity.clone()),
                    },
                );
            }
        }
    }

    pub fn matches_selector(&self, selector: &str) -> bool {
        matches_selector(self, selector)
    }

    /// Depth-first walk including `self`.
    pub fn for_each_descendant(self: &Rc<Self>, f: &mut dyn FnMut(&Rc<Element>)) {
        f(self);
        for child in self.children() {
            child.for_each_descendant(f);
        }
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("kind", &self.kind)
            .field("tag", &self.tag)
            .field("id", &self.raw_attribute("id"))
            .field("children", &self.child_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DocumentOptions;
    use crate::style::StyleRegistry;
    use crate::test_support::NullLoader;

    fn document() -> Rc<Document> {
        Document::new(DocumentOptions::default(), Rc::new(NullLoader))
    }

    fn child_of(parent: &Rc<Element>, kind: ElementType, tag: &str) -> Rc<Element> {
        let child = Rc::new(Element::new(kind, tag));
        child.set_parent(Rc::downgrade(parent));
        parent.push_child(Rc::clone(&child));
        child
    }

    #[test]
    fn test_type_table() {
        assert_eq!(ElementType::from_tag("rect"), ElementType::Rect);
        assert_eq!(ElementType::from_tag("a"), ElementType::G);
        assert_eq!(ElementType::from_tag("linearGradient"), ElementType::LinearGradient);
        assert_eq!(ElementType::from_tag("foreignObject"), ElementType::Unknown);
        assert!(ElementType::Marker.is_non_rendering());
        assert!(!ElementType::Unknown.is_non_rendering());
        assert!(ElementType::Polygon.is_shape());
    }

    #[test]
    fn test_style_falls_back_to_attribute_then_parent() {
        let doc = document();
        let group = Rc::new(Element::new(ElementType::G, "g"));
        group.set_attribute("fill", "red");
        let rect = child_of(&group, ElementType::Rect, "rect");

        assert_eq!(rect.get_style(&doc, "fill", false).get_string(), "red");
        assert!(!rect.get_style(&doc, "fill", true).has_value());

        rect.set_attribute("fill", "blue");
        assert_eq!(rect.get_style(&doc, "fill", false).get_string(), "blue");

        rect.set_style("fill", "green");
        assert_eq!(rect.get_style(&doc, "fill", false).get_string(), "green");
    }

    #[test]
    fn test_href_variants() {
        let doc = document();
        let image = Element::new(ElementType::Image, "image");
        assert!(!image.get_href_attribute(&doc).has_value());
        image.set_attribute("xlink:href", "a.png");
        assert_eq!(image.get_href_attribute(&doc).get_string(), "a.png");
        image.set_attribute("href", "b.png");
        assert_eq!(image.get_href_attribute(&doc).get_string(), "b.png");
    }

    #[test]
    fn test_rule_precedence() {
        let mut registry = StyleRegistry::new();
        registry.parse_stylesheet("#r { fill: red } rect { fill: blue; stroke: black } .c { stroke: green }");
        let rect = Element::new(ElementType::Rect, "rect");
        rect.set_attribute("id", "r");
        rect.set_attribute("class", "c d");
        rect.apply_inline_style("opacity: 0.5; ; bogus");

        for rule in registry.matching(&rect).cloned().collect::<Vec<_>>() {
            rect.apply_style_rule(&rule);
        }
        assert_eq!(rect.style_entry("fill").unwrap().value, "red");
        assert_eq!(rect.style_entry("stroke").unwrap().value, "green");

        rect.set_style("fill", "purple");
        for rule in registry.rules() {
            rect.apply_style_rule(rule);
        }
        assert_eq!(rect.style_entry("fill").unwrap().value, "purple");
        assert_eq!(rect.style_entry("opacity").unwrap().specificity, None);
    }

    #[test]
    fn test_descendant_and_child_selectors() {
        let svg = Rc::new(Element::new(ElementType::Svg, "svg"));
        let group = child_of(&svg, ElementType::G, "g");
        group.set_attribute("class", "layer");
        let rect = child_of(&group, ElementType::Rect, "rect");
        rect.set_attribute("data-kind", "box");

        assert!(rect.matches_selector("svg rect"));
        assert!(rect.matches_selector("svg > g > rect"));
        assert!(rect.matches_selector(".layer > rect[data-kind=\"box\"]"));
        assert!(rect.matches_selector("* rect[data-kind]"));
        assert!(!rect.matches_selector("svg > rect"));
        assert!(!rect.matches_selector("rect:first-child"));
        assert!(!rect.matches_selector("g + rect"));
        assert!(!rect.matches_selector("circle"));
    }
}
