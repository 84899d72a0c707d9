//! FB2 resolution
//!
//! An FB2 book is split into one section per top-level `<section>`, and
//! addressed with chapter-index CFIs. Links are `#id` inside the book or
//! `index#id` from the table of contents.

use std::collections::HashMap;

use crate::dom::{Document, DocumentTree};
use crate::error::ResolveError;

use super::{fragment_anchor, Resolution, SectionResolver};

/// Resolver for a book split into FB2 sections
#[derive(Debug, Clone, Default)]
pub struct Fb2Resolver {
    section_count: usize,
    ids: HashMap<String, usize>,
}

impl Fb2Resolver {
    /// Build from a section count and an id → section map
    pub fn new(section_count: usize, ids: HashMap<String, usize>) -> Self {
        Self { section_count, ids }
    }

    /// Build the id map by scanning the section documents; the first section
    /// holding an id wins
    pub fn from_documents(documents: &[Document]) -> Self {
        let mut ids = HashMap::new();
        for (index, doc) in documents.iter().enumerate() {
            for node in doc.descendants(doc.root()) {
                if let Some(id) = doc.id(node) {
                    ids.entry(id.to_string()).or_insert(index);
                }
            }
        }
        Self::new(documents.len(), ids)
    }
}

impl SectionResolver for Fb2Resolver {
    fn section_count(&self) -> usize {
        self.section_count
    }

    fn resolve_href(&self, href: &str) -> Result<Option<Resolution>, ResolveError> {
        let (section, fragment) = match href.split_once('#') {
            Some((section, fragment)) => (section, Some(fragment)),
            None => (href, None),
        };
        let fragment = fragment.filter(|f| !f.is_empty()).map(str::to_string);

        let index = if section.is_empty() {
            let Some(ref id) = fragment else {
                return Err(ResolveError::MalformedHref(href.to_string()));
            };
            match self.ids.get(id) {
                Some(&index) => index,
                None => return Ok(None),
            }
        } else {
            let index: usize = section
                .parse()
                .map_err(|_| ResolveError::MalformedHref(href.to_string()))?;
            if index >= self.section_count {
                return Ok(None);
            }
            index
        };
        Ok(Some(Resolution::new(index, fragment_anchor(fragment))))
    }
}
