//! EPUB resolution through the package document
//!
//! The outer leg of an EPUB CFI addresses an `<itemref>` in the package
//! document; hrefs are matched against manifest paths.

use tracing::debug;

use crate::cfi::{parse, Cfi, CfiPath};
use crate::dom::{DocumentTree, NodeId};
use crate::epub::Package;
use crate::error::ResolveError;
use crate::mapper::{from_elements, to_element};

use super::{cfi_anchor, fragment_anchor, Resolution, SectionResolver};

/// Resolver for an EPUB package
#[derive(Debug, Clone)]
pub struct EpubResolver {
    package: Package,
    section_cfis: Vec<String>,
}

impl EpubResolver {
    pub fn new(package: Package) -> Self {
        let itemrefs = package.itemrefs();
        let section_cfis = match from_elements(&package.document, &itemrefs) {
            Ok(cfis) => cfis.iter().map(Cfi::to_string).collect(),
            Err(e) => {
                debug!(error = %e, "could not address spine items");
                Vec::new()
            }
        };
        Self {
            package,
            section_cfis,
        }
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    fn spine_index_of(&self, node: NodeId) -> Option<usize> {
        let doc = &self.package.document;
        if doc.name(node) != Some("itemref") {
            return None;
        }
        self.package.spine_index(doc.attribute(node, "idref")?)
    }

    /// Find the itemref for an outer leg, by index first and then by its id assertion
    fn locate_itemref(&self, outer: CfiPath) -> Option<usize> {
        let doc = &self.package.document;
        let id = outer.last_step().and_then(|step| step.id.clone());

        match to_element(doc, &Cfi::Path(outer), None) {
            Ok(Some(node)) => {
                if let Some(index) = self.spine_index_of(node) {
                    return Some(index);
                }
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "outer leg does not resolve in package"),
        }

        let id = id?;
        debug!(id = %id, "recovering spine item by id");
        doc.element_by_id(&id).and_then(|node| self.spine_index_of(node))
    }
}

impl SectionResolver for EpubResolver {
    fn section_count(&self) -> usize {
        self.package.spine.len()
    }

    fn resolve_cfi(&self, cfi: &str) -> Result<Resolution, ResolveError> {
        let parsed = parse(cfi)?;
        let (outer, rest) = parsed.split_outer_leg();
        let index = self
            .locate_itemref(CfiPath::from_leg(outer))
            .ok_or_else(|| ResolveError::SectionNotFound(cfi.to_string()))?;
        Ok(Resolution::new(index, cfi_anchor(rest)))
    }

    fn resolve_href(&self, href: &str) -> Result<Option<Resolution>, ResolveError> {
        let (path, fragment) = match href.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment)),
            None => (href, None),
        };
        let decode = |s: &str| {
            urlencoding::decode(s)
                .map(|d| d.into_owned())
                .map_err(|_| ResolveError::MalformedHref(href.to_string()))
        };
        let path = decode(path)?;
        let fragment = fragment.filter(|f| !f.is_empty()).map(decode).transpose()?;

        let Some(index) = self
            .package
            .item_by_href(&path)
            .and_then(|item| self.package.spine_index(&item.id))
        else {
            debug!(href, "href is not in the spine");
            return Ok(None);
        };
        Ok(Some(Resolution::new(index, fragment_anchor(fragment))))
    }

    fn section_cfi(&self, index: usize) -> String {
        self.section_cfis
            .get(index)
            .cloned()
            .unwrap_or_else(|| crate::cfi::fake::from_index(index))
    }
}
