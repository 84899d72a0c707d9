//! Libros CFI
//!
//! EPUB Canonical Fragment Identifiers: parsing, serialization, ordering,
//! and mapping to positions in document trees, plus the resolution layer
//! that turns CFIs and hrefs into sections of EPUB, FB2, MOBI and comic
//! books.
//!
//! ```text
//! "epubcfi(/6/4!/4/2/1:3)" --parse--> Cfi --split outer leg--> section index
//!                                          \
//!                                           +--to_range--> Range in the section document
//! ```

pub mod book;
pub mod cfi;
pub mod config;
pub mod dom;
pub mod epub;
pub mod error;
pub mod mapper;
pub mod resolve;

pub use book::{Book, BookFilter, Located, MemorySection, Section};
pub use cfi::{compare, is_cfi, join_indir, parse, Cfi, CfiBuilder};
pub use dom::{parse_xml, Document, DocumentTree, NodeId, Point, Range};
pub use epub::EpubArchive;
pub use error::{Error, ResolveError, Result};
pub use mapper::{from_elements, from_point, from_range, to_element, to_range};
pub use resolve::{
    Anchored, ComicResolver, EpubResolver, Fb2Resolver, MobiResolver, Resolution, SectionResolver,
};
