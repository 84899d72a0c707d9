//! Resolution of navigation targets to sections
//!
//! A [`SectionResolver`] turns a CFI or href into the index of the section
//! it points into, plus an [`Anchor`] that finds the exact position once
//! that section's document has been loaded. Anchors own everything they
//! need, so a resolution can be computed before the document exists.

mod comic;
mod epub;
mod fb2;
mod mobi;

use std::fmt;

use crate::cfi::{fake, is_cfi, join_indir, parse, Cfi};
use crate::dom::{Document, DocumentTree, NodeFilter, NodeId, Range};
use crate::error::ResolveError;
use crate::mapper::{from_range, to_range};

pub use comic::ComicResolver;
pub use epub::EpubResolver;
pub use fb2::Fb2Resolver;
pub use mobi::MobiResolver;

/// Where an anchor landed inside a loaded section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchored {
    /// A CFI position or span
    Range(Range<NodeId>),
    /// A fragment target element
    Node(NodeId),
    /// No finer target than the section itself
    SectionStart,
}

/// Deferred lookup inside a section document
///
/// The filter must be the one the CFI was produced with.
pub type Anchor = Box<
    dyn Fn(&Document, Option<&dyn NodeFilter<NodeId>>) -> Result<Anchored, ResolveError>
        + Send
        + Sync,
>;

/// A section index with its anchor
pub struct Resolution {
    pub index: usize,
    pub anchor: Anchor,
}

impl Resolution {
    pub fn new(index: usize, anchor: Anchor) -> Self {
        Self { index, anchor }
    }

    /// Resolution to the start of a section
    pub fn section_start(index: usize) -> Self {
        Self::new(index, Box::new(|_, _| Ok(Anchored::SectionStart)))
    }

    /// Run the anchor against the section's document
    pub fn apply(&self, document: &Document) -> Result<Anchored, ResolveError> {
        self.apply_with(document, None)
    }

    /// Run the anchor, indexing children through `filter`
    pub fn apply_with(
        &self,
        document: &Document,
        filter: Option<&dyn NodeFilter<NodeId>>,
    ) -> Result<Anchored, ResolveError> {
        (self.anchor)(document, filter)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Anchor for the part of a CFI below the section step
pub(crate) fn cfi_anchor(rest: Option<Cfi>) -> Anchor {
    match rest {
        Some(cfi) => Box::new(move |doc, filter| to_range(doc, &cfi, filter).map(Anchored::Range)),
        None => Box::new(|_, _| Ok(Anchored::SectionStart)),
    }
}

/// Anchor for an element id, falling back to a `name` attribute
pub(crate) fn fragment_anchor(fragment: Option<String>) -> Anchor {
    match fragment {
        Some(id) => Box::new(move |doc, _| {
            doc.element_by_id(&id)
                .or_else(|| {
                    doc.descendants(doc.root())
                        .into_iter()
                        .find(|&n| doc.attribute(n, "name") == Some(id.as_str()))
                })
                .map(Anchored::Node)
                .ok_or_else(|| ResolveError::FragmentNotFound(id.clone()))
        }),
        None => Box::new(|_, _| Ok(Anchored::SectionStart)),
    }
}

/// Resolve a chapter-index CFI (see [`fake`])
pub fn resolve_fake_cfi(cfi: &str, section_count: usize) -> Result<Resolution, ResolveError> {
    let parsed = parse(cfi)?;
    let (outer, rest) = parsed.split_outer_leg();
    let index = fake::to_index(&outer)
        .filter(|&index| index < section_count)
        .ok_or_else(|| ResolveError::SectionNotFound(cfi.to_string()))?;
    Ok(Resolution::new(index, cfi_anchor(rest)))
}

/// Maps navigation targets of one book format onto its sections
pub trait SectionResolver: Send + Sync {
    fn section_count(&self) -> usize;

    /// Resolve a CFI; the default reads a chapter-index outer leg
    fn resolve_cfi(&self, cfi: &str) -> Result<Resolution, ResolveError> {
        resolve_fake_cfi(cfi, self.section_count())
    }

    /// Resolve an href; `None` when no section matches
    fn resolve_href(&self, href: &str) -> Result<Option<Resolution>, ResolveError>;

    /// CFI addressing the start of a section
    fn section_cfi(&self, index: usize) -> String {
        fake::from_index(index)
    }

    /// Resolve either kind of target
    fn resolve_navigation(&self, target: &str) -> Result<Option<Resolution>, ResolveError> {
        if is_cfi(target) {
            self.resolve_cfi(target).map(Some)
        } else {
            self.resolve_href(target)
        }
    }

    /// Full CFI for a range inside a loaded section
    fn cfi_for(
        &self,
        index: usize,
        document: &Document,
        range: &Range<NodeId>,
        filter: Option<&dyn NodeFilter<NodeId>>,
    ) -> Result<String, ResolveError> {
        let local = from_range(document, range, filter)?;
        Ok(join_indir(&[&self.section_cfi(index), &local.to_string()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse_xml, FilterResult, Point};

    fn chapter() -> Document {
        parse_xml(r#"<html><body><p id="a">Alpha</p><a name="n1">Beta</a></body></html>"#).unwrap()
    }

    #[test]
    fn test_resolve_fake_cfi() {
        let resolution = resolve_fake_cfi("epubcfi(/6/4!/2/2/1:2)", 3).unwrap();
        assert_eq!(resolution.index, 1);

        let doc = chapter();
        let Anchored::Range(range) = resolution.apply(&doc).unwrap() else {
            panic!("expected a range");
        };
        assert_eq!(doc.text(range.start.node), Some("Alpha"));
        assert_eq!(range.start.offset, 2);
    }

    #[test]
    fn test_resolve_fake_cfi_section_only() {
        let resolution = resolve_fake_cfi("epubcfi(/6/6)", 3).unwrap();
        assert_eq!(resolution.index, 2);
        assert_eq!(resolution.apply(&chapter()).unwrap(), Anchored::SectionStart);
    }

    #[test]
    fn test_resolve_fake_cfi_out_of_range() {
        assert!(matches!(
            resolve_fake_cfi("epubcfi(/6/8)", 3),
            Err(ResolveError::SectionNotFound(_))
        ));
        assert!(matches!(
            resolve_fake_cfi("epubcfi(/6/3)", 3),
            Err(ResolveError::SectionNotFound(_))
        ));
        assert!(matches!(
            resolve_fake_cfi("epubcfi(/6/4", 3),
            Err(ResolveError::Parse(_))
        ));
    }

    #[test]
    fn test_fragment_anchor() {
        let doc = chapter();
        let by_id = fragment_anchor(Some("a".into()))(&doc, None).unwrap();
        assert_eq!(by_id, Anchored::Node(doc.element_by_id("a").unwrap()));

        let by_name = fragment_anchor(Some("n1".into()))(&doc, None).unwrap();
        let Anchored::Node(node) = by_name else {
            panic!("expected a node");
        };
        assert_eq!(doc.name(node), Some("a"));

        assert_eq!(
            fragment_anchor(Some("zz".into()))(&doc, None),
            Err(ResolveError::FragmentNotFound("zz".into()))
        );
        assert_eq!(fragment_anchor(None)(&doc, None).unwrap(), Anchored::SectionStart);
    }

    #[test]
    fn test_filtered_round_trip() {
        let doc = parse_xml(
            r#"<html><body><p id="a">Alpha <span class="hl">beta</span> gamma</p></body></html>"#,
        )
        .unwrap();
        let skip_highlights = |node: NodeId| {
            if doc.attribute(node, "class") == Some("hl") {
                FilterResult::Skip
            } else {
                FilterResult::Accept
            }
        };
        let filter: Option<&dyn NodeFilter<NodeId>> = Some(&skip_highlights);

        let p = doc.element_by_id("a").unwrap();
        let gamma = *doc.children(p).last().unwrap();
        let range = Range::collapsed_at(Point::new(gamma, 1));

        let resolver = Fb2Resolver::new(1, Default::default());
        let cfi = resolver.cfi_for(0, &doc, &range, filter).unwrap();
        assert_eq!(cfi, "epubcfi(/6/2!/2/2[a]/1:11)");

        let resolution = resolver.resolve_cfi(&cfi).unwrap();
        assert_eq!(
            resolution.apply_with(&doc, filter).unwrap(),
            Anchored::Range(range)
        );
        // without the filter the merged chunk does not exist
        assert!(resolution.apply(&doc).is_err());
    }

    #[test]
    fn test_resolution_debug() {
        let resolution = Resolution::section_start(4);
        assert_eq!(format!("{:?}", resolution), "Resolution { index: 4, .. }");
    }
}
