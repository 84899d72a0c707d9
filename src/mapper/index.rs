//! Child indexing
//!
//! The filtered element and character-data children of a node are laid out
//! as `[before, chunk, element, chunk, element, ..., chunk, after]`. Adjacent
//! text nodes merge into one chunk, and a missing chunk is a virtual empty
//! one, so elements always land on even indices and chunks on odd ones.

use std::mem;

use crate::dom::{filter_node, utf16_len, DocumentTree, FilterResult, NodeFilter, NodeKind};

/// One addressable position among a node's children
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Slot<N> {
    /// Index 0
    Before,
    /// Consecutive character data nodes
    Chunk(Vec<N>),
    /// Virtual empty chunk between `prev` and `next`
    Gap { prev: Option<N>, next: Option<N> },
    Element(N),
    /// Last index
    After,
}

/// Children after filtering; skipped nodes are replaced by their own children
pub(crate) fn logical_children<T>(
    tree: &T,
    node: T::Node,
    filter: Option<&dyn NodeFilter<T::Node>>,
) -> Vec<T::Node>
where
    T: DocumentTree + ?Sized,
{
    let mut out = Vec::new();
    for child in tree.children(node) {
        if tree.kind(child) == NodeKind::Other {
            continue;
        }
        match filter_node(filter, child) {
            FilterResult::Accept => out.push(child),
            FilterResult::Reject => {}
            FilterResult::Skip => out.extend(logical_children(tree, child, filter)),
        }
    }
    out
}

fn close_chunk<N>(chunk: &mut Vec<N>, prev: Option<N>, next: Option<N>) -> Slot<N> {
    if chunk.is_empty() {
        Slot::Gap { prev, next }
    } else {
        Slot::Chunk(mem::take(chunk))
    }
}

pub(crate) fn index_child_nodes<T>(
    tree: &T,
    node: T::Node,
    filter: Option<&dyn NodeFilter<T::Node>>,
) -> Vec<Slot<T::Node>>
where
    T: DocumentTree + ?Sized,
{
    let mut slots = vec![Slot::Before];
    let mut chunk = Vec::new();
    let mut prev = None;

    for child in logical_children(tree, node, filter) {
        if tree.kind(child).is_character_data() {
            chunk.push(child);
            continue;
        }
        slots.push(close_chunk(&mut chunk, prev, Some(child)));
        slots.push(Slot::Element(child));
        prev = Some(child);
    }

    slots.push(close_chunk(&mut chunk, prev, None));
    slots.push(Slot::After);
    slots
}

/// Slot holding `node`, either as an element or inside a chunk
pub(crate) fn slot_of<N: Copy + Eq>(slots: &[Slot<N>], node: N) -> Option<usize> {
    slots.iter().position(|slot| match slot {
        Slot::Element(el) => *el == node,
        Slot::Chunk(nodes) => nodes.contains(&node),
        _ => false,
    })
}

/// Total UTF-16 length of a chunk
pub(crate) fn chunk_len<T>(tree: &T, nodes: &[T::Node]) -> usize
where
    T: DocumentTree + ?Sized,
{
    nodes
        .iter()
        .map(|&n| tree.text(n).map_or(0, utf16_len))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse_xml, Document, NodeId};

    fn kinds(slots: &[Slot<NodeId>]) -> String {
        slots
            .iter()
            .map(|slot| match slot {
                Slot::Before => 'B',
                Slot::Chunk(_) => 'c',
                Slot::Gap { .. } => 'g',
                Slot::Element(_) => 'E',
                Slot::After => 'A',
            })
            .collect()
    }

    fn body(doc: &Document) -> NodeId {
        doc.element_by_id("b").unwrap()
    }

    #[test]
    fn test_empty_element() {
        let doc = parse_xml(r#"<html><body id="b"/></html>"#).unwrap();
        assert_eq!(kinds(&index_child_nodes(&doc, body(&doc), None)), "BgA");
    }

    #[test]
    fn test_text_and_elements() {
        let doc = parse_xml(r#"<html><body id="b">a<i/>b<!--x-->c<br/><hr/></body></html>"#).unwrap();
        let slots = index_child_nodes(&doc, body(&doc), None);
        assert_eq!(kinds(&slots), "BcEcEgEgA");

        // text around the comment merges into one chunk
        let Slot::Chunk(nodes) = &slots[3] else {
            panic!("expected chunk");
        };
        assert_eq!(nodes.len(), 2);
        assert_eq!(chunk_len(&doc, nodes), 2);
    }

    #[test]
    fn test_skip_and_reject() {
        let doc = parse_xml(r#"<html><body id="b">a<span>b<i/></span><aside>x</aside>c</body></html>"#)
            .unwrap();
        let filter = |n: NodeId| match doc.name(n) {
            Some("span") => FilterResult::Skip,
            Some("aside") => FilterResult::Reject,
            _ => FilterResult::Accept,
        };
        let slots = index_child_nodes(&doc, body(&doc), Some(&filter));
        // a b merge, then <i>, then c
        assert_eq!(kinds(&slots), "BcEcA");

        let unfiltered = index_child_nodes(&doc, body(&doc), None);
        assert_eq!(kinds(&unfiltered), "BcEgEcA");
    }

    #[test]
    fn test_slot_of() {
        let doc = parse_xml(r#"<html><body id="b">a<i/>b</body></html>"#).unwrap();
        let children = doc.children(body(&doc));
        let slots = index_child_nodes(&doc, body(&doc), None);
        assert_eq!(slot_of(&slots, children[0]), Some(1));
        assert_eq!(slot_of(&slots, children[1]), Some(2));
        assert_eq!(slot_of(&slots, children[2]), Some(3));
        assert_eq!(slot_of(&slots, body(&doc)), None);
    }
}
