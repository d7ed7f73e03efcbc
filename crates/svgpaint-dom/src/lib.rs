//! # svgpaint DOM
//!
//! Generic XML node tree for the svgpaint renderer.
//! Uses xml5ever for parsing and converts its output into a traversable tree
//! with weak parent links and ordered attributes.

use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use thiserror::Error;
use tracing::debug;
use xml5ever::driver::{parse_document, XmlParseOpts};
use xml5ever::tendril::TendrilSink;

/// Errors that can occur in DOM operations.
#[derive(Error, Debug)]
pub enum DomError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Document has no root element")]
    NoRootElement,
}

/// Unique identifier for a DOM node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> usize {
        self.0
    }
}

/// Type of DOM node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeType {
    Document,
    Element {
        /// Local name, prefix stripped.
        tag_name: String,
        namespace: String,
        /// Attributes in source order. Prefixed names keep their prefix (`xlink:href`).
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
}

/// A DOM node.
#[derive(Debug)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    /// Parent node (weak reference to avoid cycles).
    parent: RefCell<Option<Weak<Node>>>,
    children: RefCell<Vec<Rc<Node>>>,
}

impl Node {
    pub fn new(id: NodeId, node_type: NodeType) -> Rc<Self> {
        Rc::new(Self {
            id,
            node_type,
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
        })
    }

    /// Get the tag name for element nodes.
    pub fn tag_name(&self) -> Option<&str> {
        match &self.node_type {
            NodeType::Element { tag_name, .. } => Some(tag_name),
            _ => None,
        }
    }

    /// Get an attribute value.
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes()
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// All attributes in source order; empty for non-elements.
    pub fn attributes(&self) -> &[(String, String)] {
        match &self.node_type {
            NodeType::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Whitespace-separated `class` tokens.
    pub fn class_list(&self) -> Vec<&str> {
        self.get_attribute("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Text of a text node.
    pub fn text(&self) -> Option<&str> {
        match &self.node_type {
            NodeType::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Get the concatenated text content.
    pub fn text_content(&self) -> String {
        let mut result = String::new();
        self.collect_text(&mut result);
        result
    }

    fn collect_text(&self, result: &mut String) {
        match &self.node_type {
            NodeType::Text(text) => result.push_str(text),
            _ => {
                for child in self.children.borrow().iter() {
                    child.collect_text(result);
                }
            }
        }
    }

    pub fn parent(&self) -> Option<Rc<Node>> {
        self.parent.borrow().as_ref().and_then(|w| w.upgrade())
    }

    /// Parent if it is an element.
    pub fn parent_element(&self) -> Option<Rc<Node>> {
        self.parent().filter(|p| p.is_element())
    }

    pub fn children(&self) -> Vec<Rc<Node>> {
        self.children.borrow().clone()
    }

    /// Element children only.
    pub fn element_children(&self) -> Vec<Rc<Node>> {
        self.children
            .borrow()
            .iter()
            .filter(|c| c.is_element())
            .cloned()
            .collect()
    }

    pub fn is_element(&self) -> bool {
        matches!(self.node_type, NodeType::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.node_type, NodeType::Text(_))
    }

    /// Append a child node.
    pub fn append_child(self: &Rc<Self>, child: Rc<Node>) {
        *child.parent.borrow_mut() = Some(Rc::downgrade(self));
        self.children.borrow_mut().push(child);
    }
}

/// A parsed XML document.
pub struct Document {
    root: Rc<Node>,
    /// Elements indexed by `id` attribute; the first occurrence wins.
    elements_by_id: HashMap<String, Rc<Node>>,
    next_id: Cell<usize>,
    node_count: usize,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self {
            root: Node::new(NodeId::new(0), NodeType::Document),
            elements_by_id: HashMap::new(),
            next_id: Cell::new(1),
            node_count: 1,
        }
    }

    /// Parse XML and create a document.
    pub fn parse_xml(xml: &str) -> Result<Self, DomError> {
        debug!(len = xml.len(), "Parsing XML");

        let dom = parse_document(RcDom::default(), XmlParseOpts::default())
            .from_utf8()
            .read_from(&mut xml.as_bytes())
            .map_err(|e| DomError::ParseError(e.to_string()))?;

        let mut doc = Document::new();
        let root = doc.root.clone();
        doc.convert_rcdom(&dom.document, &root);

        if doc.document_element().is_none() {
            return Err(DomError::NoRootElement);
        }

        doc.index_elements();

        debug!(node_count = doc.node_count, "XML parsed");
        Ok(doc)
    }

    fn convert_rcdom(&mut self, handle: &Handle, parent: &Rc<Node>) {
        for child_handle in handle.children.borrow().iter() {
            let node_type = match &child_handle.data {
                NodeData::Document | NodeData::Doctype { .. } => continue,
                NodeData::Element { name, attrs, .. } => {
                    let attributes = attrs
                        .borrow()
                        .iter()
                        .map(|attr| {
                            let key = match &attr.name.prefix {
                                Some(prefix) => format!("{}:{}", prefix, attr.name.local),
                                None => attr.name.local.to_string(),
                            };
                            (key, attr.value.to_string())
                        })
                        .collect();
                    NodeType::Element {
                        tag_name: name.local.to_string(),
                        namespace: name.ns.to_string(),
                        attributes,
                    }
                }
                NodeData::Text { contents } => NodeType::Text(contents.borrow().to_string()),
                NodeData::Comment { contents } => NodeType::Comment(contents.to_string()),
                NodeData::ProcessingInstruction { target, contents } => {
                    NodeType::ProcessingInstruction {
                        target: target.to_string(),
                        data: contents.to_string(),
                    }
                }
            };

            let id = NodeId::new(self.next_id.get());
            self.next_id.set(self.next_id.get() + 1);
            self.node_count += 1;

            let node = Node::new(id, node_type);
            parent.append_child(node.clone());

            self.convert_rcdom(child_handle, &node);
        }
    }

    fn index_elements(&mut self) {
        let mut by_id = HashMap::new();
        self.traverse(|node| {
            if let Some(id) = node.get_attribute("id") {
                by_id.entry(id.to_string()).or_insert_with(|| node.clone());
            }
        });
        self.elements_by_id = by_id;
    }

    /// Get the document root.
    pub fn root(&self) -> &Rc<Node> {
        &self.root
    }

    /// The first element child of the document node.
    pub fn document_element(&self) -> Option<Rc<Node>> {
        self.root.children().into_iter().find(|n| n.is_element())
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<Rc<Node>> {
        self.elements_by_id.get(id).cloned()
    }

    /// Elements with the given local name, in document order.
    pub fn get_elements_by_tag_name(&self, tag_name: &str) -> Vec<Rc<Node>> {
        let mut found = Vec::new();
        self.traverse(|node| {
            if node.tag_name() == Some(tag_name) {
                found.push(node.clone());
            }
        });
        found
    }

    /// Number of nodes including the document node.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Traverse all nodes depth-first in document order.
    pub fn traverse<F>(&self, mut callback: F)
    where
        F: FnMut(&Rc<Node>),
    {
        traverse_node(&self.root, &mut callback);
    }
}

fn traverse_node<F>(node: &Rc<Node>, callback: &mut F)
where
    F: FnMut(&Rc<Node>),
{
    callback(node);
    for child in node.children() {
        traverse_node(&child, callback);
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
