//! Chapter-index CFIs for formats without a package document
//!
//! FB2, MOBI and comic books have no spine element to point into, so their
//! section positions are expressed as `/6/{(index + 1) * 2}`, the same shape
//! an EPUB spine reference takes.

use super::generator::CfiBuilder;
use super::parser::parse;
use super::types::{Cfi, CfiStep};

/// CFI addressing the start of section `index`
pub fn from_index(index: usize) -> String {
    CfiBuilder::new()
        .package_step()
        .spine_item(index)
        .build()
        .to_string()
}

/// Section index addressed by a leg produced by [`from_index`]
///
/// Only the last step matters; it must be a non-zero even index.
pub fn to_index(leg: &[CfiStep]) -> Option<usize> {
    let last = leg.last()?;
    if last.index == 0 || !last.is_element() {
        return None;
    }
    Some((last.index / 2 - 1) as usize)
}

/// Section index addressed by the outer leg of a CFI
pub fn index_of(cfi: &Cfi) -> Option<usize> {
    to_index(cfi.outer_leg()?)
}

/// Section index of a chapter-index CFI string; `None` when it does not parse
pub fn index_from_str(cfi: &str) -> Option<usize> {
    index_of(&parse(cfi).ok()?)
}
