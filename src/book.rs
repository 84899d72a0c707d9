//! Books: a resolver plus lazily loaded sections
//!
//! Navigation runs in two phases. The resolver picks a section without
//! touching any content, then the section document is loaded and the
//! anchor finds the exact position in it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::dom::{Document, NodeFilter, NodeId, Range};
use crate::error::{ResolveError, Result};
use crate::resolve::{Anchored, Resolution, SectionResolver};

/// One loadable unit of a book (an EPUB spine item, an FB2 section, a page)
#[async_trait]
pub trait Section: Send + Sync {
    fn id(&self) -> &str;

    /// Load and parse the section's document
    async fn load_document(&self) -> Result<Document>;
}

/// A section whose document is already in memory
#[derive(Debug, Clone)]
pub struct MemorySection {
    id: String,
    document: Document,
}

impl MemorySection {
    pub fn new(id: impl Into<String>, document: Document) -> Self {
        Self {
            id: id.into(),
            document,
        }
    }
}

#[async_trait]
impl Section for MemorySection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn load_document(&self) -> Result<Document> {
        Ok(self.document.clone())
    }
}

/// A navigation target located inside a loaded section
#[derive(Debug, Clone)]
pub struct Located {
    pub index: usize,
    pub document: Document,
    pub anchored: Anchored,
}

/// Node filter shared by every section of a book
pub type BookFilter = Box<dyn NodeFilter<NodeId> + Send + Sync>;

/// A resolver bundled with the sections it indexes
pub struct Book {
    resolver: Box<dyn SectionResolver>,
    sections: Vec<Arc<dyn Section>>,
    filter: Option<BookFilter>,
}

impl Book {
    pub fn new(resolver: Box<dyn SectionResolver>, sections: Vec<Arc<dyn Section>>) -> Self {
        Self {
            resolver,
            sections,
            filter: None,
        }
    }

    /// Index nodes through `filter` when producing and resolving CFIs
    pub fn with_filter(mut self, filter: BookFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    fn filter(&self) -> Option<&dyn NodeFilter<NodeId>> {
        self.filter
            .as_deref()
            .map(|filter| filter as &dyn NodeFilter<NodeId>)
    }

    pub fn resolver(&self) -> &dyn SectionResolver {
        self.resolver.as_ref()
    }

    pub fn sections(&self) -> &[Arc<dyn Section>] {
        &self.sections
    }

    async fn locate(&self, target: &str, resolution: Resolution) -> Result<Located> {
        let section = self
            .sections
            .get(resolution.index)
            .ok_or_else(|| ResolveError::SectionNotFound(target.to_string()))?;
        debug!(index = resolution.index, section = section.id(), "loading section");

        let document = section.load_document().await?;
        let anchored = resolution.apply_with(&document, self.filter())?;
        Ok(Located {
            index: resolution.index,
            document,
            anchored,
        })
    }

    /// Resolve a CFI and anchor it in its section
    pub async fn anchor_cfi(&self, cfi: &str) -> Result<Located> {
        let resolution = self.resolver.resolve_cfi(cfi)?;
        self.locate(cfi, resolution).await
    }

    /// Resolve an href and anchor it; `None` when no section matches
    pub async fn anchor_href(&self, href: &str) -> Result<Option<Located>> {
        match self.resolver.resolve_href(href)? {
            Some(resolution) => Ok(Some(self.locate(href, resolution).await?)),
            None => Ok(None),
        }
    }

    /// Resolve a CFI or an href
    pub async fn go_to(&self, target: &str) -> Result<Option<Located>> {
        match self.resolver.resolve_navigation(target)? {
            Some(resolution) => Ok(Some(self.locate(target, resolution).await?)),
            None => {
                debug!(target, "navigation target not found");
                Ok(None)
            }
        }
    }

    /// Full CFI for a range in a loaded section, using the book's filter
    pub fn cfi_for(
        &self,
        located_index: usize,
        document: &Document,
        range: &Range<NodeId>,
    ) -> Result<String> {
        Ok(self
            .resolver
            .cfi_for(located_index, document, range, self.filter())?)
    }
}

impl std::fmt::Debug for Book {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Book")
            .field("sections", &self.sections.len())
            .field("filtered", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse_xml, DocumentTree, FilterResult, Point};
    use crate::epub::{testing, EpubArchive};
    use crate::error::Error;
    use crate::resolve::Fb2Resolver;

    async fn epub_book() -> Book {
        EpubArchive::from_bytes(testing::sample_epub())
            .await
            .unwrap()
            .into_book()
    }

    fn fb2_book() -> Book {
        let docs = vec![
            parse_xml(r#"<section><p id="a">Alpha</p></section>"#).unwrap(),
            parse_xml(r#"<section><p id="b">Beta</p></section>"#).unwrap(),
        ];
        let resolver = Fb2Resolver::from_documents(&docs);
        let sections = docs
            .into_iter()
            .enumerate()
            .map(|(i, doc)| Arc::new(MemorySection::new(i.to_string(), doc)) as Arc<dyn Section>)
            .collect();
        Book::new(Box::new(resolver), sections)
    }

    #[tokio::test]
    async fn test_epub_anchor_cfi() {
        let book = epub_book().await;
        let located = book.anchor_cfi("epubcfi(/6/2[ref-c1]!/4/2[p1]/1:6)").await.unwrap();
        assert_eq!(located.index, 0);

        let Anchored::Range(range) = located.anchored else {
            panic!("expected a range");
        };
        assert_eq!(located.document.text(range.start.node), Some("First chapter"));
        assert_eq!(range.start.offset, 6);
    }

    #[tokio::test]
    async fn test_epub_go_to_href() {
        let book = epub_book().await;
        let located = book
            .go_to("OEBPS/text/chapter%201.xhtml#p2")
            .await
            .unwrap()
            .unwrap();
        let Anchored::Node(node) = located.anchored else {
            panic!("expected a node");
        };
        assert_eq!(located.document.text_content(node), "More text");

        assert!(book.go_to("OEBPS/style.css").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_epub_cfi_round_trip() {
        let book = epub_book().await;
        let located = book.anchor_href("OEBPS/text/chapter2.xhtml").await.unwrap().unwrap();
        assert_eq!(located.anchored, Anchored::SectionStart);

        let doc = &located.document;
        let p = doc.elements_by_name(doc.root(), "p")[0];
        let text = doc.children(p)[0];
        let range = Range::collapsed_at(Point::new(text, 7));

        let cfi = book.cfi_for(located.index, doc, &range).unwrap();
        assert!(cfi.starts_with("epubcfi(/6/4!"), "{}", cfi);

        let again = book.anchor_cfi(&cfi).await.unwrap();
        assert_eq!(again.index, 1);
        assert_eq!(again.anchored, Anchored::Range(range));
    }

    #[tokio::test]
    async fn test_epub_bad_anchor() {
        let book = epub_book().await;
        let err = book.anchor_cfi("epubcfi(/6/4!/4/2/1:99)").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Resolve(ResolveError::OffsetOutOfBounds { .. })
        ));
    }

    #[tokio::test]
    async fn test_fb2_go_to() {
        let book = fb2_book();
        let located = book.go_to("#b").await.unwrap().unwrap();
        assert_eq!(located.index, 1);

        let by_cfi = book.go_to("epubcfi(/6/2!/2/1:2)").await.unwrap().unwrap();
        let Anchored::Range(range) = by_cfi.anchored else {
            panic!("expected a range");
        };
        assert_eq!(by_cfi.document.text(range.start.node), Some("Alpha"));
    }

    #[tokio::test]
    async fn test_filtered_book_round_trip() {
        let doc = parse_xml(
            r#"<section><p id="a">Alpha <span class="hl">beta</span> gamma</p></section>"#,
        )
        .unwrap();
        let span = doc.elements_by_name(doc.root(), "span")[0];
        let resolver = Fb2Resolver::from_documents(std::slice::from_ref(&doc));
        let sections = vec![Arc::new(MemorySection::new("0", doc)) as Arc<dyn Section>];
        let book = Book::new(Box::new(resolver), sections).with_filter(Box::new(
            move |node: NodeId| {
                if node == span {
                    FilterResult::Skip
                } else {
                    FilterResult::Accept
                }
            },
        ));

        let located = book.go_to("#a").await.unwrap().unwrap();
        let doc = &located.document;
        let p = doc.element_by_id("a").unwrap();
        let gamma = *doc.children(p).last().unwrap();
        let range = Range::collapsed_at(Point::new(gamma, 3));

        let cfi = book.cfi_for(located.index, doc, &range).unwrap();
        assert_eq!(cfi, "epubcfi(/6/2!/2[a]/1:13)");

        let again = book.anchor_cfi(&cfi).await.unwrap();
        assert_eq!(again.anchored, Anchored::Range(range));
    }

    #[tokio::test]
    async fn test_missing_section() {
        let resolver = Fb2Resolver::new(3, Default::default());
        let book = Book::new(Box::new(resolver), Vec::new());
        let err = book.anchor_cfi("epubcfi(/6/2)").await.unwrap_err();
        assert!(matches!(err, Error::Resolve(ResolveError::SectionNotFound(_))));
    }
}
