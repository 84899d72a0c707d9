//! EPUB data types
//!
//! Package entries needed to map CFIs and hrefs onto sections.

use serde::{Deserialize, Serialize};

/// Spine item (reading order)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpineItem {
    /// Index in spine
    pub index: usize,
    /// Reference to manifest item
    pub idref: String,
    /// Content path inside the archive
    pub href: String,
    /// Whether this is linear content
    pub linear: bool,
    /// Optional properties
    pub properties: Option<String>,
}

/// Manifest item (resource in the EPUB)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItem {
    /// Unique ID within the EPUB
    pub id: String,
    /// Resource path inside the archive, percent-decoded
    pub href: String,
    /// MIME type
    pub media_type: String,
    /// Optional properties (nav, cover-image, etc.)
    pub properties: Option<String>,
}
