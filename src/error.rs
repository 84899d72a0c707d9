//! Error types for the CFI engine

use thiserror::Error;

use crate::cfi::CfiParseError;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("CFI parse error: {0}")]
    Parse(#[from] CfiParseError),

    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Document error: {0}")]
    Dom(#[from] DomError),

    #[error("EPUB error: {0}")]
    Epub(#[from] EpubError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while mapping CFIs to documents and sections
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Invalid CFI: {0}")]
    Parse(#[from] CfiParseError),

    #[error("Step index {index} out of bounds ({count} slots)")]
    IndexOutOfBounds { index: u32, count: usize },

    #[error("Character offset {offset} out of bounds (length {length})")]
    OffsetOutOfBounds { offset: u32, length: usize },

    #[error("Step /{0} descends into a node that is not an element")]
    NotAnElement(u32),

    #[error("Indirection into an element without a content document")]
    MissingContentDocument,

    #[error("Cannot build range: {0}")]
    RangeConstruction(String),

    #[error("Position is inside a rejected node")]
    FilteredOut,

    #[error("Section not found: {0}")]
    SectionNotFound(String),

    #[error("Fragment not found: {0}")]
    FragmentNotFound(String),

    #[error("Malformed href: {0}")]
    MalformedHref(String),

    #[error("Elements do not share a parent")]
    NotSiblings,

    #[error("Invalid Calibre position: {0}")]
    InvalidCalibrePosition(String),
}

/// XML loading errors
#[derive(Error, Debug)]
pub enum DomError {
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Malformed document: {0}")]
    Malformed(String),
}

/// EPUB container errors
#[derive(Error, Debug)]
pub enum EpubError {
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] DomError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing file in archive: {0}")]
    MissingFile(String),

    #[error("Invalid package document: {0}")]
    InvalidPackage(String),

    #[error("Task join error: {0}")]
    Task(String),
}
