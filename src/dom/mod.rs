//! Document tree capability
//!
//! The mapper works against any tree that implements [`DocumentTree`]. The
//! crate ships an arena-backed [`Document`] with an XML loader, but a
//! caller can wrap any DOM that exposes parents, ordered children, node
//! kinds, and character data.
//!
//! Positions follow DOM range semantics: a [`Point`] inside character data
//! counts UTF-16 code units, and a [`Point`] inside an element counts raw
//! child nodes.

mod document;
mod xml;

use std::fmt::Debug;

pub use document::{Document, NodeId};
pub use xml::parse_xml;

/// Kind of a tree node, as far as CFIs are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    CData,
    /// Comments, processing instructions; never addressed
    Other,
}

impl NodeKind {
    /// Text or CDATA
    pub fn is_character_data(self) -> bool {
        matches!(self, NodeKind::Text | NodeKind::CData)
    }
}

/// Read access to a document tree
pub trait DocumentTree {
    type Node: Copy + Eq + Debug;

    /// Document element of the outermost document
    fn root(&self) -> Self::Node;

    /// Parent node; `None` for a document element
    fn parent(&self, node: Self::Node) -> Option<Self::Node>;

    /// Ordered child nodes of every kind
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;

    fn kind(&self, node: Self::Node) -> NodeKind;

    /// Character data of a text or CDATA node
    fn text(&self, node: Self::Node) -> Option<&str>;

    /// Local name of an element
    fn name(&self, node: Self::Node) -> Option<&str>;

    fn attribute(&self, node: Self::Node, name: &str) -> Option<&str>;

    fn id(&self, node: Self::Node) -> Option<&str> {
        self.attribute(node, "id")
    }

    /// Find an element by id in the outermost document
    fn element_by_id(&self, id: &str) -> Option<Self::Node> {
        let mut stack = vec![self.root()];
        while let Some(node) = stack.pop() {
            if self.kind(node) == NodeKind::Element && self.id(node) == Some(id) {
                return Some(node);
            }
            let mut children = self.children(node);
            children.reverse();
            stack.extend(children);
        }
        None
    }

    /// Document element of the document embedded in `node` (e.g. an iframe)
    fn content_root(&self, _node: Self::Node) -> Option<Self::Node> {
        None
    }

    /// Element embedding the document whose document element is `root`
    fn host(&self, _root: Self::Node) -> Option<Self::Node> {
        None
    }

    /// Document element of the document containing `node`
    fn owner_root(&self, node: Self::Node) -> Self::Node {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }
}

/// Outcome of a node filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    /// Keep the node
    Accept,
    /// Drop the node and its subtree
    Reject,
    /// Drop the node but keep its children in its place
    Skip,
}

/// Decides which nodes take part in child indexing
pub trait NodeFilter<N> {
    fn accept(&self, node: N) -> FilterResult;
}

impl<N, F> NodeFilter<N> for F
where
    F: Fn(N) -> FilterResult,
{
    fn accept(&self, node: N) -> FilterResult {
        self(node)
    }
}

/// Apply an optional filter
pub(crate) fn filter_node<N>(filter: Option<&dyn NodeFilter<N>>, node: N) -> FilterResult {
    filter.map_or(FilterResult::Accept, |f| f.accept(node))
}

/// A boundary point: a character data node and a UTF-16 offset, or an
/// element and a child index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point<N> {
    pub node: N,
    pub offset: usize,
}

impl<N> Point<N> {
    pub fn new(node: N, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A span between two boundary points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range<N> {
    pub start: Point<N>,
    pub end: Point<N>,
}

impl<N: Copy + Eq> Range<N> {
    pub fn new(start: Point<N>, end: Point<N>) -> Self {
        Self { start, end }
    }

    /// A range whose start and end coincide
    pub fn collapsed_at(point: Point<N>) -> Self {
        Self {
            start: point,
            end: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Length of a string in UTF-16 code units
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Byte index of a UTF-16 offset, if it falls on a character boundary
pub(crate) fn utf16_to_byte(text: &str, offset: usize) -> Option<usize> {
    let mut units = 0;
    for (byte, ch) in text.char_indices() {
        if units == offset {
            return Some(byte);
        }
        units += ch.len_utf16();
        if units > offset {
            return None;
        }
    }
    (units == offset).then_some(text.len())
}
