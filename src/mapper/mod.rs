//! Mapping between CFIs and positions in a document tree
//!
//! Resolution always goes by step index. Id and text assertions are checked
//! along the way and mismatches are only logged, so a CFI keeps working on a
//! document whose ids changed, and a stale one fails loudly on structure
//! instead of silently jumping elsewhere.
//!
//! A path ending on an element resolves to `Point { element, 0 }`, and that
//! point maps back to the element's own path. Any other element point
//! `Point { element, k }` maps to the chunk before child `k`.

mod index;

use std::cmp::Ordering;

use tracing::{debug, trace};

use crate::cfi::{build_range, compare_paths, Cfi, CfiPath, CfiStep};
use crate::dom::{
    filter_node, utf16_to_byte, DocumentTree, FilterResult, NodeFilter, NodeKind, Point, Range,
};
use crate::error::ResolveError;

use index::{chunk_len, index_child_nodes, slot_of, Slot};

/// What a path addresses, before the terminal offset is applied
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target<N> {
    Element(N),
    Chunk(Vec<N>),
    Gap {
        container: N,
        prev: Option<N>,
        next: Option<N>,
    },
    Before(N),
    After(N),
}

fn check_id<T>(tree: &T, element: T::Node, step: &CfiStep)
where
    T: DocumentTree + ?Sized,
{
    if let Some(ref expected) = step.id {
        let found = tree.id(element);
        if found != Some(expected.as_str()) {
            debug!(
                expected = %expected,
                found = ?found,
                index = step.index,
                "id assertion mismatch, resolving by index"
            );
        }
    }
}

fn check_text<T>(tree: &T, nodes: &[T::Node], offset: usize, step: &CfiStep)
where
    T: DocumentTree + ?Sized,
{
    let Some(ref assertion) = step.text else {
        return;
    };
    let text: String = nodes.iter().filter_map(|&n| tree.text(n)).collect();
    let Some(split) = utf16_to_byte(&text, offset) else {
        return;
    };
    let (before, after) = text.split_at(split);
    let prefix_ok = assertion
        .prefix
        .as_deref()
        .map_or(true, |prefix| before.ends_with(prefix));
    let suffix_ok = assertion
        .suffix
        .as_deref()
        .map_or(true, |suffix| after.starts_with(suffix));
    if !(prefix_ok && suffix_ok) {
        debug!(offset, "text assertion mismatch, resolving by index");
    }
}

/// Walk a path from the tree root
fn locate<T>(
    tree: &T,
    path: &CfiPath,
    filter: Option<&dyn NodeFilter<T::Node>>,
) -> Result<Target<T::Node>, ResolveError>
where
    T: DocumentTree + ?Sized,
{
    let mut node = tree.root();
    let mut target = Target::Element(node);
    let total = path.step_count();
    let mut seen = 0;

    for (leg_index, leg) in path.legs.iter().enumerate() {
        if leg_index > 0 {
            node = tree
                .content_root(node)
                .ok_or(ResolveError::MissingContentDocument)?;
            target = Target::Element(node);
        }

        for step in leg {
            seen += 1;
            let mut slots = index_child_nodes(tree, node, filter);
            let count = slots.len();
            let position = step.index as usize;
            if position >= count {
                return Err(ResolveError::IndexOutOfBounds {
                    index: step.index,
                    count,
                });
            }

            target = match slots.swap_remove(position) {
                Slot::Element(el) => {
                    check_id(tree, el, step);
                    node = el;
                    Target::Element(el)
                }
                Slot::Chunk(nodes) => Target::Chunk(nodes),
                Slot::Gap { prev, next } => Target::Gap {
                    container: node,
                    prev,
                    next,
                },
                Slot::Before => Target::Before(node),
                Slot::After => Target::After(node),
            };

            if seen < total && !matches!(target, Target::Element(_)) {
                return Err(ResolveError::NotAnElement(step.index));
            }
        }
    }

    Ok(target)
}

/// Boundary point just before (or after) `node` in its parent
fn boundary<T>(tree: &T, node: T::Node, after: bool) -> Point<T::Node>
where
    T: DocumentTree + ?Sized,
{
    match tree.parent(node) {
        Some(parent) => {
            let index = tree
                .children(parent)
                .iter()
                .position(|&c| c == node)
                .unwrap_or(0);
            Point::new(parent, if after { index + 1 } else { index })
        }
        None => Point::new(node, 0),
    }
}

fn to_point<T>(
    tree: &T,
    target: Target<T::Node>,
    step: Option<&CfiStep>,
) -> Result<Point<T::Node>, ResolveError>
where
    T: DocumentTree + ?Sized,
{
    let offset = step.and_then(|s| s.offset);

    match target {
        Target::Element(el) => {
            if let Some(offset) = offset {
                trace!(offset, "ignoring character offset on an element");
            }
            Ok(Point::new(el, 0))
        }
        Target::Chunk(nodes) => {
            let offset = offset.unwrap_or(0);
            let wanted = offset as usize;
            if let Some(step) = step {
                check_text(tree, &nodes, wanted, step);
            }
            let mut sum = 0;
            for &node in &nodes {
                let length = tree.text(node).map_or(0, crate::dom::utf16_len);
                if sum + length >= wanted {
                    return Ok(Point::new(node, wanted - sum));
                }
                sum += length;
            }
            Err(ResolveError::OffsetOutOfBounds {
                offset,
                length: sum,
            })
        }
        Target::Gap {
            container,
            prev,
            next,
        } => {
            if let Some(offset) = offset.filter(|&o| o > 0) {
                return Err(ResolveError::OffsetOutOfBounds { offset, length: 0 });
            }
            Ok(match (prev, next) {
                (_, Some(next)) => boundary(tree, next, false),
                (Some(prev), None) => boundary(tree, prev, true),
                (None, None) => Point::new(container, 0),
            })
        }
        Target::Before(container) => Ok(Point::new(container, 0)),
        Target::After(container) => Ok(Point::new(container, tree.children(container).len())),
    }
}

fn resolve_point<T>(
    tree: &T,
    path: &CfiPath,
    filter: Option<&dyn NodeFilter<T::Node>>,
) -> Result<Point<T::Node>, ResolveError>
where
    T: DocumentTree + ?Sized,
{
    let target = locate(tree, path, filter)?;
    to_point(tree, target, path.last_step())
}

/// Resolve a CFI to a range in `tree`
///
/// A plain path yields a collapsed range.
pub fn to_range<T>(
    tree: &T,
    cfi: &Cfi,
    filter: Option<&dyn NodeFilter<T::Node>>,
) -> Result<Range<T::Node>, ResolveError>
where
    T: DocumentTree + ?Sized,
{
    let start_path = cfi.collapse(false);
    let start = resolve_point(tree, &start_path, filter)?;
    if !cfi.is_range() {
        return Ok(Range::collapsed_at(start));
    }
    let end_path = cfi.collapse(true);
    if compare_paths(&start_path, &end_path) == Ordering::Greater {
        return Err(ResolveError::RangeConstruction(format!(
            "start of {} comes after its end",
            cfi
        )));
    }
    let end = resolve_point(tree, &end_path, filter)?;

    if tree.owner_root(start.node) != tree.owner_root(end.node) {
        return Err(ResolveError::RangeConstruction(format!(
            "endpoints of {} are in different documents",
            cfi
        )));
    }
    Ok(Range::new(start, end))
}

/// The node a CFI addresses: an element, or the first node of a text chunk
///
/// Virtual positions (before/after, empty chunks) have no node.
pub fn to_element<T>(
    tree: &T,
    cfi: &Cfi,
    filter: Option<&dyn NodeFilter<T::Node>>,
) -> Result<Option<T::Node>, ResolveError>
where
    T: DocumentTree + ?Sized,
{
    Ok(match locate(tree, &cfi.collapse(false), filter)? {
        Target::Element(el) => Some(el),
        Target::Chunk(nodes) => nodes.first().copied(),
        _ => None,
    })
}

/// Nearest ancestor taking part in indexing; document roots always do
fn logical_parent<T>(
    tree: &T,
    node: T::Node,
    filter: Option<&dyn NodeFilter<T::Node>>,
) -> Result<Option<T::Node>, ResolveError>
where
    T: DocumentTree + ?Sized,
{
    let mut current = tree.parent(node);
    while let Some(parent) = current {
        if tree.parent(parent).is_none() {
            return Ok(Some(parent));
        }
        match filter_node(filter, parent) {
            FilterResult::Accept => return Ok(Some(parent)),
            FilterResult::Reject => return Err(ResolveError::FilteredOut),
            FilterResult::Skip => current = tree.parent(parent),
        }
    }
    Ok(None)
}

/// Path to an element, crossing into host documents as needed
fn element_path<T>(
    tree: &T,
    element: T::Node,
    filter: Option<&dyn NodeFilter<T::Node>>,
) -> Result<CfiPath, ResolveError>
where
    T: DocumentTree + ?Sized,
{
    let mut legs = vec![Vec::new()];
    let mut current = element;

    loop {
        match logical_parent(tree, current, filter)? {
            Some(parent) => {
                let slots = index_child_nodes(tree, parent, filter);
                let index = slot_of(&slots, current).ok_or(ResolveError::FilteredOut)?;
                let step = CfiStep {
                    index: index as u32,
                    id: tree.id(current).map(str::to_string),
                    ..CfiStep::default()
                };
                legs[0].insert(0, step);
                current = parent;
            }
            None => match tree.host(current) {
                Some(host) => {
                    legs.insert(0, Vec::new());
                    current = host;
                }
                None => break,
            },
        }
    }

    Ok(CfiPath::new(legs))
}

fn with_step(base: CfiPath, step: CfiStep) -> CfiPath {
    base.concat(&CfiPath::from_leg(vec![step]))
}

/// Step for the chunk slot at `index`, positioned at its end
fn chunk_end_step<T>(tree: &T, slots: &[Slot<T::Node>], index: usize) -> CfiStep
where
    T: DocumentTree + ?Sized,
{
    match &slots[index] {
        Slot::Chunk(nodes) => CfiStep::with_offset(index as u32, chunk_len(tree, nodes) as u32),
        _ => CfiStep::new(index as u32),
    }
}

fn text_position<T>(
    tree: &T,
    node: T::Node,
    offset: usize,
    filter: Option<&dyn NodeFilter<T::Node>>,
) -> Result<CfiPath, ResolveError>
where
    T: DocumentTree + ?Sized,
{
    if filter_node(filter, node) != FilterResult::Accept {
        return Err(ResolveError::FilteredOut);
    }
    let parent = logical_parent(tree, node, filter)?.ok_or(ResolveError::FilteredOut)?;
    let slots = index_child_nodes(tree, parent, filter);
    let index = slot_of(&slots, node).ok_or(ResolveError::FilteredOut)?;
    let Slot::Chunk(ref nodes) = slots[index] else {
        return Err(ResolveError::FilteredOut);
    };

    // Offsets count from the start of the merged chunk
    let preceding: usize = nodes
        .iter()
        .take_while(|&&n| n != node)
        .map(|&n| tree.text(n).map_or(0, crate::dom::utf16_len))
        .sum();
    let length = tree.text(node).map_or(0, crate::dom::utf16_len);
    let out_of_bounds = || ResolveError::OffsetOutOfBounds {
        offset: u32::try_from(offset).unwrap_or(u32::MAX),
        length,
    };
    if offset > length {
        return Err(out_of_bounds());
    }
    let total = u32::try_from(preceding + offset).map_err(|_| out_of_bounds())?;
    let step = CfiStep::with_offset(index as u32, total);

    Ok(with_step(element_path(tree, parent, filter)?, step))
}

/// First node at or below `node` that takes part in indexing
fn first_indexed<T>(
    tree: &T,
    node: T::Node,
    filter: Option<&dyn NodeFilter<T::Node>>,
) -> Option<T::Node>
where
    T: DocumentTree + ?Sized,
{
    if tree.kind(node) == NodeKind::Other {
        return None;
    }
    match filter_node(filter, node) {
        FilterResult::Accept => Some(node),
        FilterResult::Reject => None,
        FilterResult::Skip => tree
            .children(node)
            .into_iter()
            .find_map(|child| first_indexed(tree, child, filter)),
    }
}

/// Position immediately before an indexed node
fn path_before<T>(
    tree: &T,
    node: T::Node,
    filter: Option<&dyn NodeFilter<T::Node>>,
) -> Result<CfiPath, ResolveError>
where
    T: DocumentTree + ?Sized,
{
    if tree.kind(node).is_character_data() {
        return text_position(tree, node, 0, filter);
    }
    let parent = logical_parent(tree, node, filter)?.ok_or(ResolveError::FilteredOut)?;
    let slots = index_child_nodes(tree, parent, filter);
    let index = slot_of(&slots, node).ok_or(ResolveError::FilteredOut)?;
    let step = chunk_end_step(tree, &slots, index - 1);
    Ok(with_step(element_path(tree, parent, filter)?, step))
}

/// Position before raw child `k` of `container`
fn position_before<T>(
    tree: &T,
    container: T::Node,
    k: usize,
    filter: Option<&dyn NodeFilter<T::Node>>,
) -> Result<CfiPath, ResolveError>
where
    T: DocumentTree + ?Sized,
{
    for child in tree.children(container).into_iter().skip(k) {
        if let Some(node) = first_indexed(tree, child, filter) {
            return path_before(tree, node, filter);
        }
    }

    // Nothing indexed follows: the end of the container's content
    let parent = tree.parent(container);
    let verdict = match parent {
        None => FilterResult::Accept,
        Some(_) => filter_node(filter, container),
    };
    match (verdict, parent) {
        (FilterResult::Reject, _) => Err(ResolveError::FilteredOut),
        (FilterResult::Skip, Some(parent)) => {
            let index = tree
                .children(parent)
                .iter()
                .position(|&c| c == container)
                .unwrap_or(0);
            position_before(tree, parent, index + 1, filter)
        }
        _ => {
            let slots = index_child_nodes(tree, container, filter);
            let step = chunk_end_step(tree, &slots, slots.len() - 2);
            Ok(with_step(element_path(tree, container, filter)?, step))
        }
    }
}

/// Path for a single boundary point
pub fn from_point<T>(
    tree: &T,
    point: Point<T::Node>,
    filter: Option<&dyn NodeFilter<T::Node>>,
) -> Result<CfiPath, ResolveError>
where
    T: DocumentTree + ?Sized,
{
    match tree.kind(point.node) {
        NodeKind::Text | NodeKind::CData => text_position(tree, point.node, point.offset, filter),
        NodeKind::Element => {
            let addressable = point.offset == 0
                && tree.parent(point.node).is_some()
                && filter_node(filter, point.node) == FilterResult::Accept;
            if addressable {
                element_path(tree, point.node, filter)
            } else {
                position_before(tree, point.node, point.offset, filter)
            }
        }
        // Comments are never addressed; use the position in front of them
        NodeKind::Other => match tree.parent(point.node) {
            Some(_) => {
                let before = boundary(tree, point.node, false);
                position_before(tree, before.node, before.offset, filter)
            }
            None => Err(ResolveError::FilteredOut),
        },
    }
}

/// CFI for a range: a path when collapsed, otherwise a range CFI
pub fn from_range<T>(
    tree: &T,
    range: &Range<T::Node>,
    filter: Option<&dyn NodeFilter<T::Node>>,
) -> Result<Cfi, ResolveError>
where
    T: DocumentTree + ?Sized,
{
    let start = from_point(tree, range.start, filter)?;
    if range.is_collapsed() {
        return Ok(Cfi::Path(start));
    }
    let end = from_point(tree, range.end, filter)?;
    Ok(Cfi::Range(build_range(&Cfi::Path(start), &Cfi::Path(end))?))
}

/// CFIs for sibling elements given in document order
///
/// The ancestor path is computed once and shared by every result.
pub fn from_elements<T>(tree: &T, elements: &[T::Node]) -> Result<Vec<Cfi>, ResolveError>
where
    T: DocumentTree + ?Sized,
{
    let Some(&first) = elements.first() else {
        return Ok(Vec::new());
    };
    let parent = tree.parent(first).ok_or(ResolveError::NotSiblings)?;
    if elements.iter().any(|&el| tree.parent(el) != Some(parent)) {
        return Err(ResolveError::NotSiblings);
    }

    let base = element_path(tree, parent, None)?;
    let mut results = Vec::with_capacity(elements.len());
    for (index, slot) in index_child_nodes(tree, parent, None).iter().enumerate() {
        let Some(&el) = elements.get(results.len()) else {
            break;
        };
        if matches!(slot, Slot::Element(node) if *node == el) {
            let step = CfiStep {
                index: index as u32,
                id: tree.id(el).map(str::to_string),
                ..CfiStep::default()
            };
            results.push(Cfi::Path(with_step(base.clone(), step)));
        }
    }

    if results.len() != elements.len() {
        return Err(ResolveError::NotSiblings);
    }
    Ok(results)
}
