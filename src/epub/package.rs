//! Container and package document parsing
//!
//! Reads `META-INF/container.xml` to find the package document, then the
//! manifest and spine from the package. The package tree is kept: CFIs
//! address itemrefs through it.

use tracing::debug;

use crate::dom::{parse_xml, Document, DocumentTree, NodeId, NodeKind};
use crate::error::EpubError;

use super::types::{ManifestItem, SpineItem};

/// Path of the container file inside every EPUB
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Path of the package document named by `container.xml`
pub fn rootfile_path(container_xml: &str) -> Result<String, EpubError> {
    let doc = parse_xml(container_xml)?;
    doc.elements_by_name(doc.root(), "rootfile")
        .into_iter()
        .find_map(|node| doc.attribute(node, "full-path").map(str::to_string))
        .ok_or_else(|| EpubError::InvalidPackage("container.xml has no rootfile".into()))
}

/// Resolve `href` against the directory of `base` (a file path in the archive)
pub fn resolve_path(base: &str, href: &str) -> String {
    let mut segments: Vec<&str> = base.split('/').collect();
    segments.pop();

    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.retain(|s| !s.is_empty());
    segments.join("/")
}

fn decode_href(href: &str) -> String {
    match urlencoding::decode(href) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            debug!(href, error = %e, "keeping undecodable manifest href");
            href.to_string()
        }
    }
}

/// A parsed package document
#[derive(Debug, Clone)]
pub struct Package {
    /// Path of the package document inside the archive
    pub path: String,
    /// The package document tree
    pub document: Document,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
}

impl Package {
    /// Parse a package document located at `path`
    pub fn parse(path: &str, xml: &str) -> Result<Self, EpubError> {
        let document = parse_xml(xml)?;
        let root = document.root();
        if document.name(root) != Some("package") {
            return Err(EpubError::InvalidPackage(format!(
                "root element is <{}>",
                document.name(root).unwrap_or_default()
            )));
        }

        let child = |name: &str| -> Option<NodeId> {
            document
                .children(root)
                .into_iter()
                .find(|&n| document.kind(n) == NodeKind::Element && document.name(n) == Some(name))
        };

        let manifest_el = child("manifest")
            .ok_or_else(|| EpubError::InvalidPackage("missing <manifest>".into()))?;
        let spine_el =
            child("spine").ok_or_else(|| EpubError::InvalidPackage("missing <spine>".into()))?;

        let manifest: Vec<ManifestItem> = document
            .children(manifest_el)
            .into_iter()
            .filter(|&n| document.name(n) == Some("item"))
            .filter_map(|n| {
                let id = document.attribute(n, "id")?;
                let href = document.attribute(n, "href")?;
                Some(ManifestItem {
                    id: id.to_string(),
                    href: resolve_path(path, &decode_href(href)),
                    media_type: document
                        .attribute(n, "media-type")
                        .unwrap_or_default()
                        .to_string(),
                    properties: document.attribute(n, "properties").map(str::to_string),
                })
            })
            .collect();

        let spine = document
            .children(spine_el)
            .into_iter()
            .filter(|&n| document.name(n) == Some("itemref"))
            .enumerate()
            .map(|(index, n)| {
                let idref = document.attribute(n, "idref").unwrap_or_default().to_string();
                let href = manifest
                    .iter()
                    .find(|item| item.id == idref)
                    .map(|item| item.href.clone())
                    .unwrap_or_default();
                SpineItem {
                    index,
                    idref,
                    href,
                    linear: document.attribute(n, "linear") != Some("no"),
                    properties: document.attribute(n, "properties").map(str::to_string),
                }
            })
            .collect();

        Ok(Self {
            path: path.to_string(),
            document,
            manifest,
            spine,
        })
    }

    /// The `<spine>` element
    pub fn spine_element(&self) -> Option<NodeId> {
        self.document
            .children(self.document.root())
            .into_iter()
            .find(|&n| self.document.name(n) == Some("spine"))
    }

    /// `<itemref>` elements in spine order
    pub fn itemrefs(&self) -> Vec<NodeId> {
        self.spine_element()
            .map(|spine| {
                self.document
                    .children(spine)
                    .into_iter()
                    .filter(|&n| self.document.name(n) == Some("itemref"))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Manifest item with the given archive path
    pub fn item_by_href(&self, href: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.href == href)
    }

    /// Spine position of a manifest id
    pub fn spine_index(&self, idref: &str) -> Option<usize> {
        self.spine.iter().position(|item| item.idref == idref)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    pub const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Test</dc:title></metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="c1" href="text/chapter%201.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="text/chapter2.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="../style.css" media-type="text/css"/>
  </manifest>
  <spine>
    <itemref idref="c1" id="ref-c1"/>
    <itemref idref="c2" linear="no"/>
  </spine>
</package>"#;

    pub const CHAPTER_1: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml"><head><title>One</title></head><body><p id="p1">First chapter</p><p id="p2">More text</p></body></html>"#;

    pub const CHAPTER_2: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Two</title></head><body><p>Second chapter</p></body></html>"#;
}
