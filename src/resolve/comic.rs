//! Comic book resolution: one section per page image, linked by file name

use crate::error::ResolveError;

use super::{Resolution, SectionResolver};

#[derive(Debug, Clone, Default)]
pub struct ComicResolver {
    pages: Vec<String>,
}

impl ComicResolver {
    /// Page names in reading order
    pub fn new(pages: Vec<String>) -> Self {
        Self { pages }
    }
}

impl SectionResolver for ComicResolver {
    fn section_count(&self) -> usize {
        self.pages.len()
    }

    fn resolve_href(&self, href: &str) -> Result<Option<Resolution>, ResolveError> {
        Ok(self
            .pages
            .iter()
            .position(|page| page == href)
            .map(Resolution::section_start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_page() {
        let resolver = ComicResolver::new(vec!["001.jpg".into(), "002.jpg".into()]);
        assert_eq!(resolver.resolve_href("002.jpg").unwrap().unwrap().index, 1);
        assert!(resolver.resolve_href("003.jpg").unwrap().is_none());
        assert_eq!(resolver.resolve_navigation("epubcfi(/6/2)").unwrap().unwrap().index, 0);
    }
}
