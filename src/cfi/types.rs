//! CFI (Canonical Fragment Identifier) types for EPUB
//!
//! EPUB CFI is a standardized way to reference specific locations within EPUB publications.
//! Format: epubcfi(/6/4[chap01ref]!/4/2/22/3:268)
//!
//! A parsed CFI is either a [`CfiPath`] (a sequence of legs joined by `!`) or a
//! [`CfiRange`] (a common parent path plus relative start and end paths).
//!
//! Reference: <https://idpf.org/epub/linking/cfi/epub-cfi.html>

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single leg of a path: the steps between two indirections.
pub type Leg = Vec<CfiStep>;

/// A parsed CFI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Cfi {
    /// A single location
    Path(CfiPath),
    /// A span between two locations sharing a parent
    Range(CfiRange),
}

/// A CFI path (legs of steps, outer to inner)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CfiPath {
    /// Legs, separated by step indirections (`!`) in the textual form
    pub legs: Vec<Leg>,
}

/// A CFI range (for text selections)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfiRange {
    /// Common ancestor path
    pub parent: CfiPath,
    /// Start of the range (relative path from `parent`)
    pub start: CfiPath,
    /// End of the range (relative path from `parent`)
    pub end: CfiPath,
}

/// A single step in a CFI path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfiStep {
    /// Child index: even numbers address elements, odd numbers character data
    pub index: u32,
    /// Optional ID assertion `[id]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Character offset (terminal step only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    /// Temporal offset for audio/video
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<TemporalOffset>,
    /// Spatial offset for images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial: Option<SpatialOffset>,
    /// Text location assertion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextAssertion>,
    /// Side bias (`;s=b` / `;s=a`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
}

/// Text location assertion for disambiguation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextAssertion {
    /// Text before the location
    pub prefix: Option<String>,
    /// Text after the location
    pub suffix: Option<String>,
}

/// Temporal offset for audio/video (in seconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalOffset {
    /// Time in seconds
    pub seconds: f64,
}

/// Spatial offset for images (percentage-based)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialOffset {
    /// X coordinate as percentage (0.0-100.0)
    pub x: f64,
    /// Y coordinate as percentage (0.0-100.0)
    pub y: f64,
}

/// Which side of a boundary an offset refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Before,
    After,
}

impl Side {
    /// Parse the value of an `s=` parameter
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "b" => Some(Side::Before),
            "a" => Some(Side::After),
            _ => None,
        }
    }

    /// The `s=` parameter value
    pub fn as_param(self) -> &'static str {
        match self {
            Side::Before => "b",
            Side::After => "a",
        }
    }
}

impl Cfi {
    /// Check if this CFI represents a range (text selection)
    pub fn is_range(&self) -> bool {
        matches!(self, Cfi::Range(_))
    }

    /// Collapse to a single path pointing at the start (or end) of the range.
    ///
    /// A plain path collapses to itself on both sides.
    pub fn collapse(&self, to_end: bool) -> CfiPath {
        match self {
            Cfi::Path(path) => path.clone(),
            Cfi::Range(range) => range.collapse(to_end),
        }
    }

    /// The outermost leg (of the parent, for ranges)
    pub fn outer_leg(&self) -> Option<&Leg> {
        match self {
            Cfi::Path(path) => path.legs.first(),
            Cfi::Range(range) => range.parent.legs.first(),
        }
    }

    /// Remove the outermost leg, returning it together with what remains.
    ///
    /// The remainder is `None` when nothing follows the outer leg.
    pub fn split_outer_leg(&self) -> (Leg, Option<Cfi>) {
        match self {
            Cfi::Path(path) => {
                let mut legs = path.legs.clone();
                let outer = if legs.is_empty() { Vec::new() } else { legs.remove(0) };
                let rest = (!legs.is_empty()).then(|| Cfi::Path(CfiPath { legs }));
                (outer, rest)
            }
            Cfi::Range(range) => {
                let mut parent = range.parent.legs.clone();
                let outer = if parent.is_empty() { Vec::new() } else { parent.remove(0) };
                let rest = CfiRange {
                    parent: CfiPath { legs: parent },
                    start: range.start.clone(),
                    end: range.end.clone(),
                };
                (outer, Some(Cfi::Range(rest)))
            }
        }
    }
}

impl From<CfiPath> for Cfi {
    fn from(path: CfiPath) -> Self {
        Cfi::Path(path)
    }
}

impl From<CfiRange> for Cfi {
    fn from(range: CfiRange) -> Self {
        Cfi::Range(range)
    }
}

impl CfiPath {
    /// Create a path from legs
    pub fn new(legs: Vec<Leg>) -> Self {
        Self { legs }
    }

    /// Create a single-leg path
    pub fn from_leg(leg: Leg) -> Self {
        Self { legs: vec![leg] }
    }

    /// The final step of the final leg
    pub fn last_step(&self) -> Option<&CfiStep> {
        self.legs.last().and_then(|leg| leg.last())
    }

    /// Number of steps across all legs
    pub fn step_count(&self) -> usize {
        self.legs.iter().map(Vec::len).sum()
    }

    /// Concatenate a relative path onto this one.
    ///
    /// The first leg of `other` continues the last leg of `self`.
    pub fn concat(&self, other: &CfiPath) -> CfiPath {
        let mut legs = self.legs.clone();
        let mut rest = other.legs.iter();
        match (legs.last_mut(), rest.next()) {
            (Some(last), Some(first)) => last.extend(first.iter().cloned()),
            (None, Some(first)) => legs.push(first.clone()),
            _ => {}
        }
        legs.extend(rest.cloned());
        CfiPath { legs }
    }
}

impl CfiRange {
    /// Collapse to the start (or end) of the range
    pub fn collapse(&self, to_end: bool) -> CfiPath {
        self.parent
            .concat(if to_end { &self.end } else { &self.start })
    }
}

impl CfiStep {
    /// Create a step with only an index
    pub fn new(index: u32) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    /// Create a step with an ID assertion
    pub fn with_id(index: u32, id: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Create a character data step with an offset
    pub fn with_offset(index: u32, offset: u32) -> Self {
        Self {
            index,
            offset: Some(offset),
            ..Self::default()
        }
    }

    /// Whether this step addresses an element (even index)
    pub fn is_element(&self) -> bool {
        self.index % 2 == 0
    }

    /// Whether any terminal qualifier (offset, temporal, spatial) is set
    pub fn has_qualifiers(&self) -> bool {
        self.offset.is_some() || self.temporal.is_some() || self.spatial.is_some()
    }
}

/// Escape the characters that are special inside brackets
pub(crate) fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '^' | '[' | ']' | '(' | ')' | ',' | ';' | '=') {
            out.push('^');
        }
        out.push(ch);
    }
    out
}

// Display implementations for serialization

impl fmt::Display for Cfi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cfi::Path(path) => write!(f, "epubcfi({})", path),
            Cfi::Range(range) => write!(f, "epubcfi({})", range),
        }
    }
}

/// Bare form, without the `epubcfi(...)` wrapper
impl fmt::Display for CfiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, leg) in self.legs.iter().enumerate() {
            if i > 0 {
                write!(f, "!")?;
            }
            for step in leg {
                write!(f, "{}", step)?;
            }
        }
        Ok(())
    }
}

/// Bare form, without the `epubcfi(...)` wrapper
impl fmt::Display for CfiRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.parent, self.start, self.end)
    }
}

impl fmt::Display for CfiStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = self.side.map(|s| format!(";s={}", s.as_param()));

        write!(f, "/{}", self.index)?;
        if let Some(ref id) = self.id {
            write!(f, "[{}", escape(id))?;
            if self.text.is_none() {
                if let Some(ref side) = side {
                    write!(f, "{}", side)?;
                }
            }
            write!(f, "]")?;
        }
        if let Some(offset) = self.offset {
            write!(f, ":{}", offset)?;
        }
        if let Some(ref temporal) = self.temporal {
            write!(f, "~{}", temporal.seconds)?;
        }
        if let Some(ref spatial) = self.spatial {
            write!(f, "@{}:{}", spatial.x, spatial.y)?;
        }
        match (&self.text, &side) {
            (Some(text), _) => {
                write!(f, "[{}", text)?;
                if let Some(ref side) = side {
                    write!(f, "{}", side)?;
                }
                write!(f, "]")?;
            }
            (None, Some(side)) if self.id.is_none() => write!(f, "[{}]", side)?,
            _ => {}
        }
        Ok(())
    }
}

/// Bracket content without the brackets
impl fmt::Display for TextAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref prefix) = self.prefix {
            write!(f, "{}", escape(prefix))?;
        }
        if let Some(ref suffix) = self.suffix {
            write!(f, ",{}", escape(suffix))?;
        }
        Ok(())
    }
}
