//! Arena-backed document tree
//!
//! All nodes live in one vector and refer to each other by index. Embedded
//! documents (iframes, the content documents a package points into) are
//! copied into the same arena and linked through `content`/`host`, so one
//! [`Document`] can hold a whole indirection chain.

use std::collections::HashMap;

use super::{DocumentTree, NodeKind};

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    name: Option<String>,
    attributes: Vec<(String, String)>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Root of an embedded document
    content: Option<NodeId>,
    /// Element embedding this document root
    host: Option<NodeId>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            name: None,
            attributes: Vec::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
            content: None,
            host: None,
        }
    }
}

/// An XML/XHTML document tree
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    /// Map from id attribute to element, for the outermost document only
    id_map: HashMap<String, NodeId>,
}

impl Document {
    /// Create a document with an empty document element
    pub fn new(root_name: &str) -> Self {
        let mut root = Node::new(NodeKind::Element);
        root.name = Some(root_name.to_string());
        Self {
            nodes: vec![root],
            root: NodeId(0),
            id_map: HashMap::new(),
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    fn alloc(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        node.parent = Some(parent);
        self.nodes.push(node);
        if let Some(parent) = self.nodes.get_mut(parent.0 as usize) {
            parent.children.push(id);
        }
        id
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append an element as the last child of `parent`
    pub fn append_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        let mut node = Node::new(NodeKind::Element);
        node.name = Some(name.to_string());
        self.alloc(parent, node)
    }

    /// Append a text node as the last child of `parent`
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let mut node = Node::new(NodeKind::Text);
        node.text = text.to_string();
        self.alloc(parent, node)
    }

    /// Append a CDATA section as the last child of `parent`
    pub fn append_cdata(&mut self, parent: NodeId, text: &str) -> NodeId {
        let mut node = Node::new(NodeKind::CData);
        node.text = text.to_string();
        self.alloc(parent, node)
    }

    /// Append a comment as the last child of `parent`
    pub fn append_comment(&mut self, parent: NodeId, text: &str) -> NodeId {
        let mut node = Node::new(NodeKind::Other);
        node.text = text.to_string();
        self.alloc(parent, node)
    }

    /// Set (or replace) an attribute on an element
    pub fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) {
        let in_outer = self.owner_root(element) == self.root;
        let Some(node) = self.nodes.get_mut(element.0 as usize) else {
            return;
        };
        match node.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => node.attributes.push((name.to_string(), value.to_string())),
        }
        // First element with a given id wins, as with getElementById
        if name == "id" && in_outer {
            self.id_map.entry(value.to_string()).or_insert(element);
        }
    }

    /// Builder-style variant of [`append_element`](Self::append_element)
    /// that also sets an id
    pub fn append_element_with_id(&mut self, parent: NodeId, name: &str, id: &str) -> NodeId {
        let element = self.append_element(parent, name);
        self.set_attribute(element, "id", id);
        element
    }

    /// Embed another document inside `host`, returning the embedded root
    pub fn attach_document(&mut self, host: NodeId, document: Document) -> NodeId {
        let shift = self.nodes.len() as u32;
        let moved = |id: NodeId| NodeId(id.0 + shift);

        for mut node in document.nodes {
            node.parent = node.parent.map(moved);
            node.children = node.children.into_iter().map(moved).collect();
            node.content = node.content.map(moved);
            node.host = node.host.map(moved);
            self.nodes.push(node);
        }

        let root = moved(document.root);
        if let Some(node) = self.nodes.get_mut(root.0 as usize) {
            node.host = Some(host);
        }
        if let Some(node) = self.nodes.get_mut(host.0 as usize) {
            node.content = Some(root);
        }
        root
    }

    /// Concatenated character data below `node`, within its own document
    pub fn text_content(&self, node: NodeId) -> String {
        self.descendants(node)
            .into_iter()
            .filter_map(|n| {
                let data = self.node(n)?;
                data.kind.is_character_data().then_some(data.text.as_str())
            })
            .collect()
    }

    /// `node` and everything below it in document order
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(data) = self.node(current) {
                stack.extend(data.children.iter().rev().copied());
            }
        }
        out
    }

    /// Position of `node` among its parent's raw children
    pub fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.node(node)?.parent?;
        self.node(parent)?.children.iter().position(|&c| c == node)
    }

    /// All elements with the given local name, in document order
    pub fn elements_by_name(&self, root: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|&n| {
                self.node(n)
                    .is_some_and(|d| d.kind == NodeKind::Element && d.name.as_deref() == Some(name))
            })
            .collect()
    }
}

impl DocumentTree for Document {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        self.root
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn kind(&self, node: NodeId) -> NodeKind {
        self.node(node).map_or(NodeKind::Other, |n| n.kind)
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        let data = self.node(node)?;
        data.kind.is_character_data().then_some(data.text.as_str())
    }

    fn name(&self, node: NodeId) -> Option<&str> {
        self.node(node)?.name.as_deref()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node)?
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.id_map.get(id).copied()
    }

    fn content_root(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.content
    }

    fn host(&self, root: NodeId) -> Option<NodeId> {
        self.node(root)?.host
    }
}
