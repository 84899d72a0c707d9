//! EPUB container access
//!
//! Opens the ZIP archive, locates and parses the package document, and
//! exposes each spine item as a lazily loaded [`Section`].

mod package;
mod types;

use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::book::{Book, Section};
use crate::dom::{parse_xml, Document};
use crate::error::{EpubError, Result};
use crate::resolve::EpubResolver;

pub use package::{resolve_path, rootfile_path, Package, CONTAINER_PATH};
pub use types::{ManifestItem, SpineItem};

#[cfg(test)]
pub(crate) use package::fixtures;

/// Read a UTF-8 file out of an in-memory archive
fn read_entry(data: &[u8], name: &str) -> std::result::Result<String, EpubError> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let mut file = archive.by_name(name).map_err(|e| match e {
        ZipError::FileNotFound => EpubError::MissingFile(name.to_string()),
        other => EpubError::Zip(other),
    })?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

fn load_package(data: &[u8]) -> std::result::Result<Package, EpubError> {
    let container = read_entry(data, CONTAINER_PATH)?;
    let path = rootfile_path(&container)?;
    let opf = read_entry(data, &path)?;
    Package::parse(&path, &opf)
}

/// An opened EPUB file
#[derive(Debug, Clone)]
pub struct EpubArchive {
    data: Arc<Vec<u8>>,
    package: Package,
}

impl EpubArchive {
    /// Open an EPUB from a file path
    pub async fn open<P: AsRef<Path>>(path: P) -> std::result::Result<Self, EpubError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "opening EPUB");
        let data = tokio::fs::read(path).await?;
        Self::from_bytes(data).await
    }

    /// Open an EPUB from bytes
    pub async fn from_bytes(data: Vec<u8>) -> std::result::Result<Self, EpubError> {
        let data = Arc::new(data);
        let archive = Arc::clone(&data);
        let package = tokio::task::spawn_blocking(move || load_package(&archive))
            .await
            .map_err(|e| EpubError::Task(format!("Task join error: {}", e)))??;

        tracing::debug!(
            package = %package.path,
            sections = package.spine.len(),
            "parsed package document"
        );
        Ok(Self { data, package })
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    /// One section per spine item
    pub fn sections(&self) -> Vec<Arc<dyn Section>> {
        self.package
            .spine
            .iter()
            .map(|item| {
                Arc::new(EpubSection {
                    id: item.idref.clone(),
                    path: item.href.clone(),
                    data: Arc::clone(&self.data),
                }) as Arc<dyn Section>
            })
            .collect()
    }

    /// Bundle the resolver and sections into a [`Book`]
    pub fn into_book(self) -> Book {
        let sections = self.sections();
        Book::new(Box::new(EpubResolver::new(self.package)), sections)
    }
}

/// A spine item, loaded from the archive on demand
#[derive(Debug, Clone)]
pub struct EpubSection {
    id: String,
    path: String,
    data: Arc<Vec<u8>>,
}

impl EpubSection {
    /// Path of the content document inside the archive
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl Section for EpubSection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn load_document(&self) -> Result<Document> {
        let data = Arc::clone(&self.data);
        let path = self.path.clone();
        let document = tokio::task::spawn_blocking(move || {
            let content = read_entry(&data, &path)?;
            Ok::<_, EpubError>(parse_xml(&content)?)
        })
        .await
        .map_err(|e| EpubError::Task(format!("Task join error: {}", e)))??;
        Ok(document)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::Write;

    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    use super::fixtures;

    /// A small two-chapter EPUB
    pub fn sample_epub() -> Vec<u8> {
        let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for (name, content) in [
            ("mimetype", "application/epub+zip"),
            ("META-INF/container.xml", fixtures::CONTAINER),
            ("OEBPS/content.opf", fixtures::OPF),
            ("OEBPS/text/chapter 1.xhtml", fixtures::CHAPTER_1),
            ("OEBPS/text/chapter2.xhtml", fixtures::CHAPTER_2),
        ] {
            writer.start_file(name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::dom::DocumentTree;

    #[tokio::test]
    async fn test_open_from_bytes() {
        let archive = EpubArchive::from_bytes(testing::sample_epub()).await.unwrap();
        assert_eq!(archive.package().spine.len(), 2);

        let sections = archive.sections();
        assert_eq!(sections[1].id(), "c2");

        let doc = sections[0].load_document().await.unwrap();
        let p = doc.element_by_id("p1").unwrap();
        assert_eq!(doc.text_content(p), "First chapter");
    }

    #[tokio::test]
    async fn test_open_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&testing::sample_epub()).unwrap();

        let archive = EpubArchive::open(file.path()).await.unwrap();
        assert_eq!(archive.package().path, "OEBPS/content.opf");
    }

    #[tokio::test]
    async fn test_missing_container() {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file("mimetype", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"application/epub+zip").unwrap();
        let data = writer.finish().unwrap().into_inner();

        let err = EpubArchive::from_bytes(data).await.unwrap_err();
        assert!(matches!(err, EpubError::MissingFile(ref name) if name == CONTAINER_PATH));
    }

    #[tokio::test]
    async fn test_not_a_zip() {
        let err = EpubArchive::from_bytes(b"plain text".to_vec()).await.unwrap_err();
        assert!(matches!(err, EpubError::Zip(_)));
    }
}
