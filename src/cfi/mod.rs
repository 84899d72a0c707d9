//! CFI (Canonical Fragment Identifier) module for EPUB
//!
//! This module provides parsing, serialization, generation, and comparison of
//! EPUB CFI strings.
//!
//! # Overview
//!
//! EPUB CFI is a standardized way to reference specific locations within EPUB publications.
//! It uses a path-based syntax similar to XPath but designed specifically for EPUBs.
//!
//! # Example CFI
//!
//! ```text
//! epubcfi(/6/4[chap01]!/4[body01]/10[para05]/3:10)
//!         │  │        │ │        │          │ └── character offset 10
//!         │  │        │ │        │          └──── character data (odd = text)
//!         │  │        │ │        └─────────────── element index with ID
//!         │  │        │ └──────────────────────── body element
//!         │  │        └────────────────────────── indirection (into content doc)
//!         │  └─────────────────────────────────── spine item with ID
//!         └────────────────────────────────────── spine element
//! ```
//!
//! A range shares a parent path and carries two relative endpoints:
//! `epubcfi(/6/4!/4/10,/1:3,/3:7)`.
//!
//! # Usage
//!
//! ```ignore
//! use libros_cfi::cfi::{parse, compare, is_before, CfiBuilder};
//!
//! let cfi = parse("epubcfi(/6/4!/4/2/1:42)").unwrap();
//!
//! let built = CfiBuilder::new()
//!     .package_step()
//!     .spine_item(1)
//!     .indirection()
//!     .element(1)
//!     .element(0)
//!     .text_node(0)
//!     .character_offset(42)
//!     .build();
//! assert_eq!(cfi, built);
//!
//! let a = parse("epubcfi(/6/4!/4/2/1:10)").unwrap();
//! let b = parse("epubcfi(/6/4!/4/2/1:20)").unwrap();
//! assert!(is_before(&a, &b));
//! ```

pub mod calibre;
mod comparator;
pub mod fake;
mod generator;
mod parser;
mod types;

// Re-export main types
pub use types::{
    Cfi, CfiPath, CfiRange, CfiStep, Leg, Side, SpatialOffset, TemporalOffset, TextAssertion,
};

// Re-export parser functions
pub use parser::{is_cfi, parse, try_parse, CfiParseError};

// Re-export generator
pub use generator::{build_range, join_indir, CfiBuilder};

// Re-export comparator functions
pub use comparator::{compare, compare_paths, compare_strs, is_after, is_before, is_in_range};

pub use calibre::{from_calibre_highlight, from_calibre_pos};
