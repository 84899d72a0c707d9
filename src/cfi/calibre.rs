//! Conversion of Calibre reader positions and highlights
//!
//! Calibre stores positions as `/{item}[id]/{root}/...`: the first step picks
//! the spine item and the second addresses the document root. Highlights
//! carry a spine index plus start and end paths relative to the document.

use crate::error::ResolveError;

use super::fake;
use super::generator::build_range;
use super::parser::parse;
use super::types::{Cfi, CfiPath, CfiStep, Leg};

/// Convert a Calibre bookmark position into a CFI
///
/// `/4[c1]/4/2/1:3` becomes `epubcfi(/6/4[c1]!/2/1:3)`.
pub fn from_calibre_pos(pos: &str) -> Result<Cfi, ResolveError> {
    let steps = single_leg(pos)?;
    if steps.len() < 2 {
        return Err(ResolveError::InvalidCalibrePosition(pos.to_string()));
    }

    let mut steps = steps.into_iter();
    let item = steps.next().into_iter();
    let rest: Leg = steps.skip(1).collect();

    let mut legs = vec![std::iter::once(CfiStep::new(6)).chain(item).collect::<Leg>()];
    if !rest.is_empty() {
        legs.push(rest);
    }
    Ok(Cfi::Path(CfiPath::new(legs)))
}

/// Convert a Calibre highlight into a CFI range
pub fn from_calibre_highlight(
    spine_index: usize,
    start_cfi: &str,
    end_cfi: &str,
) -> Result<Cfi, ResolveError> {
    let prefix = parse(&fake::from_index(spine_index))?.collapse(false);

    let anchor = |local: &str| -> Result<Cfi, ResolveError> {
        let steps = single_leg(local)?;
        if steps.len() < 2 {
            return Err(ResolveError::InvalidCalibrePosition(local.to_string()));
        }
        // Drop the document root step
        let inner = CfiPath::from_leg(steps[1..].to_vec());
        let mut path = prefix.clone();
        path.legs.extend(inner.legs);
        Ok(Cfi::Path(path))
    };

    let range = build_range(&anchor(start_cfi)?, &anchor(end_cfi)?)?;
    Ok(Cfi::Range(range))
}

fn single_leg(input: &str) -> Result<Leg, ResolveError> {
    match parse(input)? {
        Cfi::Path(mut path) if path.legs.len() == 1 => Ok(path.legs.remove(0)),
        _ => Err(ResolveError::InvalidCalibrePosition(input.to_string())),
    }
}
