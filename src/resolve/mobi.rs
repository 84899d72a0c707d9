//! MOBI resolution
//!
//! MOBI 6 links are `filepos:N`, a byte position in the decompressed text;
//! the section is the last one starting at or before `N`, and the target is
//! the `filepos{N}` anchor the loader emitted. KF8 links are
//! `kindle:pos:fid:XXXX:off:YYYY` with base-32 numbers.

use tracing::debug;

use crate::error::ResolveError;

use super::{fragment_anchor, Resolution, SectionResolver};

/// Resolver for a MOBI book
#[derive(Debug, Clone, Default)]
pub struct MobiResolver {
    section_starts: Vec<u64>,
}

impl MobiResolver {
    /// Byte positions where each section starts, ascending
    pub fn new(section_starts: Vec<u64>) -> Self {
        Self { section_starts }
    }

    fn section_at(&self, filepos: u64) -> Option<usize> {
        self.section_starts.iter().rposition(|&start| start <= filepos)
    }

    fn resolve_filepos(&self, href: &str, value: &str) -> Result<Option<Resolution>, ResolveError> {
        let filepos: u64 = value
            .trim()
            .parse()
            .map_err(|_| ResolveError::MalformedHref(href.to_string()))?;
        Ok(self.section_at(filepos).map(|index| {
            Resolution::new(index, fragment_anchor(Some(format!("filepos{}", filepos))))
        }))
    }

    fn resolve_kindle_pos(&self, href: &str, value: &str) -> Result<Option<Resolution>, ResolveError> {
        let malformed = || ResolveError::MalformedHref(href.to_string());
        let (fid, off) = value
            .strip_prefix("fid:")
            .and_then(|rest| rest.split_once(":off:"))
            .ok_or_else(malformed)?;
        let fid = u64::from_str_radix(fid, 32).map_err(|_| malformed())?;
        let off = u64::from_str_radix(off, 32).map_err(|_| malformed())?;

        let Ok(index) = usize::try_from(fid) else {
            return Ok(None);
        };
        if index >= self.section_starts.len() {
            return Ok(None);
        }
        // offsets point into raw markup, which the loaded tree no longer has
        debug!(fid, off, "kindle position resolved to section start");
        Ok(Some(Resolution::section_start(index)))
    }
}

impl SectionResolver for MobiResolver {
    fn section_count(&self) -> usize {
        self.section_starts.len()
    }

    fn resolve_href(&self, href: &str) -> Result<Option<Resolution>, ResolveError> {
        if let Some(value) = href.strip_prefix("filepos:") {
            self.resolve_filepos(href, value)
        } else if let Some(value) = href.strip_prefix("kindle:pos:") {
            self.resolve_kindle_pos(href, value)
        } else {
            Err(ResolveError::MalformedHref(href.to_string()))
        }
    }
}
