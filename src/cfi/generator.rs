//! CFI Generator
//!
//! Builds CFIs programmatically, joins serialized CFIs across indirections,
//! and combines two positions into a range.

use crate::error::ResolveError;

use super::types::*;

/// Builder for constructing CFIs programmatically
#[derive(Debug, Clone, Default)]
pub struct CfiBuilder {
    path: CfiPath,
}

impl CfiBuilder {
    /// Create a new CFI builder
    pub fn new() -> Self {
        Self {
            path: CfiPath::from_leg(Vec::new()),
        }
    }

    fn push(mut self, step: CfiStep) -> Self {
        match self.path.legs.last_mut() {
            Some(leg) => leg.push(step),
            None => self.path.legs.push(vec![step]),
        }
        self
    }

    fn update_last(mut self, update: impl FnOnce(&mut CfiStep)) -> Self {
        if let Some(step) = self.path.legs.last_mut().and_then(|leg| leg.last_mut()) {
            update(step);
        }
        self
    }

    /// Add a step to the package document (/6 is the spine)
    pub fn package_step(self) -> Self {
        self.push(CfiStep::new(6))
    }

    /// Add a spine item step (converts 0-based index to CFI format)
    /// CFI uses 1-based even numbering: index 0 -> /2, index 1 -> /4, etc.
    pub fn spine_item(self, index: usize) -> Self {
        self.element(index)
    }

    /// Add a spine item step with ID assertion
    pub fn spine_item_with_id(self, index: usize, id: impl Into<String>) -> Self {
        self.element_with_id(index, id)
    }

    /// Start a new leg (entering a content document)
    pub fn indirection(mut self) -> Self {
        self.path.legs.push(Vec::new());
        self
    }

    /// Add an element step within the current leg
    /// Uses 1-based even numbering: index 0 -> /2, index 1 -> /4, etc.
    pub fn element(self, index: usize) -> Self {
        self.push(CfiStep::new(((index + 1) * 2) as u32))
    }

    /// Add a step with a raw CFI index
    pub fn raw(self, cfi_index: u32) -> Self {
        self.push(CfiStep::new(cfi_index))
    }

    /// Add an element step with ID assertion
    pub fn element_with_id(self, index: usize, id: impl Into<String>) -> Self {
        self.push(CfiStep::with_id(((index + 1) * 2) as u32, id))
    }

    /// Add a character data step (odd numbers)
    /// The chunk before the first element is /1, the next one /3, etc.
    pub fn text_node(self, index: usize) -> Self {
        self.push(CfiStep::new((index * 2 + 1) as u32))
    }

    /// Set the character offset on the last step
    pub fn character_offset(self, offset: u32) -> Self {
        self.update_last(|step| step.offset = Some(offset))
    }

    /// Set the character offset with text assertion for validation
    pub fn character_offset_with_assertion(
        self,
        offset: u32,
        prefix: Option<String>,
        suffix: Option<String>,
    ) -> Self {
        self.update_last(|step| {
            step.offset = Some(offset);
            step.text = Some(TextAssertion { prefix, suffix });
        })
    }

    /// Set a temporal offset (for audio/video)
    pub fn temporal_offset(self, seconds: f64) -> Self {
        self.update_last(|step| step.temporal = Some(TemporalOffset { seconds }))
    }

    /// Set a spatial offset (for images)
    pub fn spatial_offset(self, x: f64, y: f64) -> Self {
        self.update_last(|step| step.spatial = Some(SpatialOffset { x, y }))
    }

    /// Set the side bias of the last step
    pub fn side(self, side: Side) -> Self {
        self.update_last(|step| step.side = Some(side))
    }

    /// Build the final CFI
    pub fn build(self) -> Cfi {
        Cfi::Path(self.path)
    }

    /// Get the current path
    pub fn path(&self) -> &CfiPath {
        &self.path
    }
}

fn unwrap(cfi: &str) -> &str {
    let cfi = cfi.trim();
    cfi.strip_prefix("epubcfi(")
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(cfi)
}

/// Join serialized CFIs (wrapped or bare) as successive indirection legs
///
/// ```ignore
/// assert_eq!(join_indir(&["epubcfi(/6/4)", "/4/2"]), "epubcfi(/6/4!/4/2)");
/// ```
pub fn join_indir(parts: &[&str]) -> String {
    let inner: Vec<&str> = parts.iter().map(|part| unwrap(part)).collect();
    format!("epubcfi({})", inner.join("!"))
}

/// Combine two positions into a range.
///
/// `from` is collapsed to its start and `to` to its end. Both must share
/// every leg but the last; the common prefix of the last legs becomes the
/// local parent. Steps carrying offsets never enter the parent.
pub fn build_range(from: &Cfi, to: &Cfi) -> Result<CfiRange, ResolveError> {
    let from = from.collapse(false);
    let to = to.collapse(true);

    let (Some((local_from, outer_from)), Some((local_to, outer_to))) =
        (from.legs.split_last(), to.legs.split_last())
    else {
        return Err(ResolveError::RangeConstruction(
            "range endpoints must not be empty".into(),
        ));
    };

    let same_outer = outer_from.len() == outer_to.len()
        && outer_from.iter().zip(outer_to).all(|(a, b)| {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.index == y.index)
        });
    if !same_outer {
        return Err(ResolveError::RangeConstruction(format!(
            "endpoints are in different documents: {} and {}",
            from, to
        )));
    }
    if local_from.is_empty() || local_to.is_empty() {
        return Err(ResolveError::RangeConstruction(
            "range endpoints must not be empty".into(),
        ));
    }

    // Keep at least one step in each endpoint
    let limit = local_from.len().min(local_to.len()) - 1;
    let common = local_from
        .iter()
        .zip(local_to)
        .take(limit)
        .take_while(|(a, b)| a.index == b.index && !a.has_qualifiers() && !b.has_qualifiers())
        .count();

    let mut parent = outer_from.to_vec();
    parent.push(local_from[..common].to_vec());

    Ok(CfiRange {
        parent: CfiPath::new(parent),
        start: CfiPath::from_leg(local_from[common..].to_vec()),
        end: CfiPath::from_leg(local_to[common..].to_vec()),
    })
}
