//! XML/XHTML loader built on quick-xml
//!
//! Whitespace-only text is preserved, since CFI indices count every
//! character data chunk between elements.

use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::DomError;

use super::{Document, DocumentTree, NodeId};

/// Strip a namespace prefix (`opf:spine` -> `spine`)
fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

fn element_name(e: &BytesStart<'_>) -> Result<String, DomError> {
    let name = e.name();
    Ok(std::str::from_utf8(local_name(name.as_ref()))?.to_string())
}

fn copy_attributes(doc: &mut Document, node: NodeId, e: &BytesStart<'_>) -> Result<(), DomError> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value_with(resolve_html5_entity)?;
        doc.set_attribute(node, &key, &value);
    }
    Ok(())
}

/// Create an element under the current parent, or the document element
fn open_element(
    doc: &mut Option<Document>,
    stack: &[NodeId],
    e: &BytesStart<'_>,
) -> Result<NodeId, DomError> {
    let name = element_name(e)?;
    match doc {
        Some(document) => {
            let parent = stack.last().copied().ok_or_else(|| {
                DomError::Malformed(format!("second document element <{}>", name))
            })?;
            let node = document.append_element(parent, &name);
            copy_attributes(document, node, e)?;
            Ok(node)
        }
        None => {
            let mut created = Document::new(&name);
            let root = created.root();
            copy_attributes(&mut created, root, e)?;
            *doc = Some(created);
            Ok(root)
        }
    }
}

/// Parse an XML document into a [`Document`]
pub fn parse_xml(input: &str) -> Result<Document, DomError> {
    let mut reader = Reader::from_str(input);

    let mut doc: Option<Document> = None;
    let mut stack: Vec<NodeId> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let node = open_element(&mut doc, &stack, &e)?;
                stack.push(node);
            }
            Event::Empty(e) => {
                open_element(&mut doc, &stack, &e)?;
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(e) => {
                // Text outside the document element is insignificant
                if let (Some(doc), Some(&parent)) = (&mut doc, stack.last()) {
                    let text = e.unescape_with(resolve_html5_entity)?;
                    doc.append_text(parent, &text);
                }
            }
            Event::CData(e) => {
                if let (Some(doc), Some(&parent)) = (&mut doc, stack.last()) {
                    let text = std::str::from_utf8(&e)?;
                    doc.append_cdata(parent, text);
                }
            }
            Event::Comment(e) => {
                if let (Some(doc), Some(&parent)) = (&mut doc, stack.last()) {
                    let text = std::str::from_utf8(&e)?;
                    doc.append_comment(parent, text);
                }
            }
            Event::Eof => break,
            // Declarations, doctypes and processing instructions
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DomError::Malformed("unclosed elements at end of input".into()));
    }
    doc.ok_or_else(|| DomError::Malformed("no document element".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeKind;

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"spine"), b"spine");
        assert_eq!(local_name(b"opf:spine"), b"spine");
        assert_eq!(local_name(b""), b"");
    }

    #[test]
    fn test_parse_xhtml() {
        let doc = parse_xml(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<body id="b"><p class="x">One &amp; two&nbsp;<br/>three</p><!-- c --></body>
</html>"#,
        )
        .unwrap();

        let root = doc.root();
        assert_eq!(doc.name(root), Some("html"));
        // whitespace text, body, whitespace text
        assert_eq!(doc.children(root).len(), 3);

        let body = doc.element_by_id("b").unwrap();
        let children = doc.children(body);
        assert_eq!(children.len(), 2);
        assert_eq!(doc.kind(children[1]), NodeKind::Other);

        let p = children[0];
        assert_eq!(doc.attribute(p, "class"), Some("x"));
        assert_eq!(doc.text_content(p), "One & two\u{a0}three");
        assert_eq!(doc.children(p).len(), 3);
    }

    #[test]
    fn test_parse_prefixed_names_and_cdata() {
        let doc = parse_xml(r#"<opf:package><opf:spine><![CDATA[a<b]]></opf:spine></opf:package>"#)
            .unwrap();
        let spine = doc.children(doc.root())[0];
        assert_eq!(doc.name(spine), Some("spine"));
        let data = doc.children(spine)[0];
        assert_eq!(doc.kind(data), NodeKind::CData);
        assert_eq!(doc.text(data), Some("a<b"));
    }

    #[test]
    fn test_html_entities() {
        let doc = parse_xml(
            r#"<html><body><p title="caf&eacute;">caf&eacute; &ndash; &lt;&euro;&gt;</p></body></html>"#,
        )
        .unwrap();
        let p = doc.elements_by_name(doc.root(), "p")[0];
        assert_eq!(doc.text_content(p), "caf\u{e9} \u{2013} <\u{20ac}>");
        assert_eq!(doc.attribute(p, "title"), Some("caf\u{e9}"));

        assert!(parse_xml("<p>&notanentity;</p>").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_xml("").is_err());
        assert!(parse_xml("<a><b></a>").is_err());
        assert!(parse_xml("<a></a><b/>").is_err());
    }
}
