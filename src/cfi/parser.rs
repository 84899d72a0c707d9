//! CFI Parser
//!
//! Parses EPUB CFI strings into structured [`Cfi`] values.
//!
//! Grammar (simplified):
//! ```text
//! cfi        = ["epubcfi("] path ["," local "," local] [")"]
//! path       = leg *("!" leg)
//! leg        = *step
//! step       = "/" number [bracket] [qualifiers] [bracket]
//! local      = path | qualifiers [bracket]
//! qualifiers = [":" number] ["~" float] ["@" float ":" float]
//! bracket    = "[" value *("," value) *(";" key "=" value) "]"
//! ```
//!
//! Inside brackets `^` escapes the following character.

use std::cmp::Ordering;

use thiserror::Error;

use super::comparator::compare_paths;
use super::types::*;

/// CFI parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CfiParseError {
    #[error("Empty CFI string")]
    Empty,

    #[error("CFI must end with ')'")]
    MissingClosingParen,

    #[error("Empty leg at position {0} (unbalanced '!')")]
    EmptyLeg(usize),

    #[error("Expected number at position {0}")]
    ExpectedNumber(usize),

    #[error("Unclosed bracket at position {0}")]
    UnclosedBracket(usize),

    #[error("Invalid character offset at position {0}")]
    InvalidCharacterOffset(usize),

    #[error("Invalid temporal offset at position {0}")]
    InvalidTemporalOffset(usize),

    #[error("Invalid spatial offset at position {0}")]
    InvalidSpatialOffset(usize),

    #[error("Invalid side bias '{0}'")]
    InvalidSide(String),

    #[error("Offset on a non-terminal step at position {0}")]
    MisplacedOffset(usize),

    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("Invalid range format")]
    InvalidRange,
}

/// Bracket content: comma separated values and `;key=value` parameters
#[derive(Debug, Default)]
struct Bracket {
    values: Vec<String>,
    side: Option<Side>,
}

/// A local path of a range, before normalization
enum LocalPath {
    /// Starts with a step
    Steps(CfiPath),
    /// Starts with an offset that applies to the parent's last step
    Terminal(CfiStep),
}

/// Parser state
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_str(&mut self, s: &str) -> bool {
        if self.input[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn unexpected(&self) -> CfiParseError {
        CfiParseError::UnexpectedChar(self.peek().unwrap_or('\0'), self.pos)
    }

    fn take_digits(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            self.advance();
        }
        &self.input[start..self.pos]
    }

    /// Parse a sequence of digits as u32
    fn parse_number(&mut self) -> Result<u32, CfiParseError> {
        let start = self.pos;
        let digits = self.take_digits();
        digits
            .parse()
            .map_err(|_| CfiParseError::ExpectedNumber(start))
    }

    /// Parse a non-negative decimal number
    fn parse_float(&mut self) -> Option<f64> {
        let start = self.pos;
        self.take_digits();
        if self.skip_if('.') {
            self.take_digits();
        }
        let text = &self.input[start..self.pos];
        if !text.bytes().any(|b| b.is_ascii_digit()) {
            return None;
        }
        text.parse().ok()
    }

    /// Parse `[...]` after the opening bracket has been seen
    fn parse_bracket(&mut self) -> Result<Bracket, CfiParseError> {
        let start = self.pos;
        self.advance();

        let mut bracket = Bracket::default();
        let mut value = String::new();
        // Some(key) while reading a parameter value
        let mut param: Option<String> = None;

        loop {
            let Some(ch) = self.advance() else {
                return Err(CfiParseError::UnclosedBracket(start));
            };
            match ch {
                '^' => match self.advance() {
                    Some(escaped) => value.push(escaped),
                    None => return Err(CfiParseError::UnclosedBracket(start)),
                },
                ',' if param.is_none() => bracket.values.push(std::mem::take(&mut value)),
                ';' => {
                    match param.take() {
                        Some(key) => apply_param(&mut bracket, &key, &value)?,
                        None => bracket.values.push(std::mem::take(&mut value)),
                    }
                    value.clear();
                    param = Some(String::new());
                }
                '=' if matches!(param, Some(ref key) if key.is_empty()) => {
                    param = Some(std::mem::take(&mut value));
                }
                ']' => {
                    match param.take() {
                        Some(key) => apply_param(&mut bracket, &key, &value)?,
                        None => bracket.values.push(value),
                    }
                    return Ok(bracket);
                }
                '[' => return Err(CfiParseError::UnexpectedChar('[', self.pos - 1)),
                other => value.push(other),
            }
        }
    }

    /// Parse `:offset`, `~temporal` and `@x:y` onto a step
    fn parse_qualifiers(&mut self, step: &mut CfiStep) -> Result<(), CfiParseError> {
        if self.skip_if(':') {
            let at = self.pos;
            step.offset = Some(
                self.parse_number()
                    .map_err(|_| CfiParseError::InvalidCharacterOffset(at))?,
            );
        }

        if self.skip_if('~') {
            let at = self.pos;
            let seconds = self
                .parse_float()
                .ok_or(CfiParseError::InvalidTemporalOffset(at))?;
            step.temporal = Some(TemporalOffset { seconds });
        }

        if self.skip_if('@') {
            let at = self.pos;
            let x = self
                .parse_float()
                .ok_or(CfiParseError::InvalidSpatialOffset(at))?;
            if !self.skip_if(':') {
                return Err(CfiParseError::InvalidSpatialOffset(at));
            }
            let y = self
                .parse_float()
                .ok_or(CfiParseError::InvalidSpatialOffset(at))?;
            step.spatial = Some(SpatialOffset { x, y });
        }

        if self.peek() == Some('[') {
            let bracket = self.parse_bracket()?;
            let mut values = bracket.values.into_iter().map(non_empty);
            let prefix = values.next().flatten();
            let suffix = values.next().flatten();
            if prefix.is_some() || suffix.is_some() {
                step.text = Some(TextAssertion { prefix, suffix });
            }
            if bracket.side.is_some() {
                step.side = bracket.side;
            }
        }

        Ok(())
    }

    /// Parse a single step, positioned at '/'
    fn parse_step(&mut self) -> Result<CfiStep, CfiParseError> {
        self.advance();
        let mut step = CfiStep::new(self.parse_number()?);

        if self.peek() == Some('[') {
            let bracket = self.parse_bracket()?;
            step.id = bracket.values.into_iter().next().and_then(non_empty);
            step.side = bracket.side;
        }

        self.parse_qualifiers(&mut step)?;
        Ok(step)
    }

    /// Parse legs separated by '!', recording where each leg starts
    fn parse_path(&mut self) -> Result<(CfiPath, Vec<usize>), CfiParseError> {
        let mut legs = Vec::new();
        let mut starts = Vec::new();

        loop {
            starts.push(self.pos);
            let mut leg = Vec::new();
            while self.peek() == Some('/') {
                let at = self.pos;
                if leg.last().is_some_and(CfiStep::has_qualifiers) {
                    return Err(CfiParseError::MisplacedOffset(at));
                }
                leg.push(self.parse_step()?);
            }
            legs.push(leg);

            if !self.skip_if('!') {
                break;
            }
        }

        Ok((CfiPath::new(legs), starts))
    }

    /// Parse a range endpoint
    fn parse_local(&mut self) -> Result<LocalPath, CfiParseError> {
        match self.peek() {
            Some(':') | Some('~') | Some('@') | Some('[') => {
                let mut step = CfiStep::default();
                self.parse_qualifiers(&mut step)?;
                Ok(LocalPath::Terminal(step))
            }
            _ => {
                let (path, starts) = self.parse_path()?;
                check_legs(&path, &starts, path.legs.len())?;
                check_offsets(&path, &starts, true)?;
                Ok(LocalPath::Steps(path))
            }
        }
    }

    /// Parse the content inside the optional wrapper
    fn parse_inner(&mut self) -> Result<Cfi, CfiParseError> {
        let (path, starts) = self.parse_path()?;

        if !self.skip_if(',') {
            check_legs(&path, &starts, path.legs.len())?;
            check_offsets(&path, &starts, true)?;
            return Ok(Cfi::Path(path));
        }

        // The parent's last leg may be empty when the endpoints diverge at its first step
        check_legs(&path, &starts, path.legs.len() - 1)?;
        let start = self.parse_local()?;
        if !self.skip_if(',') {
            return Err(CfiParseError::InvalidRange);
        }
        let end = self.parse_local()?;
        if self.peek() == Some(',') {
            return Err(CfiParseError::InvalidRange);
        }

        let range = normalize_range(path, start, end)?;
        check_offsets(&range.parent, &starts, false)?;
        Ok(Cfi::Range(range))
    }

    /// Parse a complete CFI
    fn parse_cfi(&mut self) -> Result<Cfi, CfiParseError> {
        let wrapped = self.skip_str("epubcfi(");
        let cfi = self.parse_inner()?;

        if wrapped && !self.skip_if(')') {
            return Err(if self.at_end() {
                CfiParseError::MissingClosingParen
            } else {
                self.unexpected()
            });
        }

        Ok(cfi)
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn apply_param(bracket: &mut Bracket, key: &str, value: &str) -> Result<(), CfiParseError> {
    if key == "s" {
        let side = Side::from_param(value).ok_or_else(|| CfiParseError::InvalidSide(value.to_string()))?;
        bracket.side = Some(side);
    } else {
        // Reading systems ignore parameters they do not understand
        tracing::trace!(key, value, "ignoring CFI parameter");
    }
    Ok(())
}

/// Every leg before `allow_empty_from` must have at least one step
fn check_legs(path: &CfiPath, starts: &[usize], allow_empty_from: usize) -> Result<(), CfiParseError> {
    for (i, leg) in path.legs.iter().enumerate() {
        if leg.is_empty() && i < allow_empty_from {
            return Err(CfiParseError::EmptyLeg(starts.get(i).copied().unwrap_or(0)));
        }
    }
    Ok(())
}

/// Qualifiers may only appear on the final step of the final leg
fn check_offsets(path: &CfiPath, starts: &[usize], allow_terminal: bool) -> Result<(), CfiParseError> {
    let last_leg = path.legs.len().saturating_sub(1);
    for (i, leg) in path.legs.iter().enumerate() {
        let Some(last) = leg.last() else { continue };
        if last.has_qualifiers() && (i != last_leg || !allow_terminal) {
            return Err(CfiParseError::MisplacedOffset(
                starts.get(i).copied().unwrap_or(0),
            ));
        }
    }
    Ok(())
}

/// Move the parent's last step into offset-only endpoints (`/4/2/1,:0,:5`)
fn normalize_range(
    mut parent: CfiPath,
    start: LocalPath,
    end: LocalPath,
) -> Result<CfiRange, CfiParseError> {
    let needs_step = matches!(start, LocalPath::Terminal(_)) || matches!(end, LocalPath::Terminal(_));
    let shared = if needs_step {
        let step = parent
            .legs
            .last_mut()
            .and_then(|leg| leg.pop())
            .ok_or(CfiParseError::InvalidRange)?;
        Some(step)
    } else {
        None
    };

    let attach = |local: LocalPath| -> CfiPath {
        match (local, &shared) {
            (LocalPath::Terminal(qualifiers), Some(step)) => CfiPath::from_leg(vec![CfiStep {
                index: step.index,
                id: step.id.clone(),
                ..qualifiers
            }]),
            (LocalPath::Steps(path), Some(step)) => CfiPath::from_leg(vec![step.clone()]).concat(&path),
            (LocalPath::Steps(path), None) => path,
            (LocalPath::Terminal(qualifiers), None) => CfiPath::from_leg(vec![qualifiers]),
        }
    };

    let range = CfiRange {
        start: attach(start),
        end: attach(end),
        parent,
    };

    if range.start.step_count() == 0 || range.end.step_count() == 0 {
        return Err(CfiParseError::InvalidRange);
    }
    // Both endpoints live in the same document, start first
    if range.start.legs.len() != range.end.legs.len()
        || compare_paths(&range.collapse(false), &range.collapse(true)) == Ordering::Greater
    {
        return Err(CfiParseError::InvalidRange);
    }
    Ok(range)
}

/// Check whether a string carries the `epubcfi(...)` wrapper
pub fn is_cfi(input: &str) -> bool {
    let input = input.trim();
    input.starts_with("epubcfi(") && input.ends_with(')')
}

/// Parse a CFI string, with or without the `epubcfi(...)` wrapper
pub fn parse(input: &str) -> Result<Cfi, CfiParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CfiParseError::Empty);
    }

    let mut parser = Parser::new(input);
    let cfi = parser.parse_cfi()?;

    // Ensure we consumed all input
    if !parser.at_end() {
        return Err(parser.unexpected());
    }

    Ok(cfi)
}

/// Parse a CFI string, discarding the error
pub fn try_parse(input: &str) -> Option<Cfi> {
    parse(input).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(cfi: &Cfi) -> &CfiPath {
        match cfi {
            Cfi::Path(path) => path,
            Cfi::Range(_) => panic!("expected a path"),
        }
    }

    fn range(cfi: &Cfi) -> &CfiRange {
        match cfi {
            Cfi::Range(range) => range,
            Cfi::Path(_) => panic!("expected a range"),
        }
    }

    #[test]
    fn test_parse_simple_cfi() {
        let cfi = parse("epubcfi(/6/4!/4/2)").unwrap();
        let path = path(&cfi);
        assert_eq!(path.legs.len(), 2);
        assert_eq!(path.legs[0], vec![CfiStep::new(6), CfiStep::new(4)]);
        assert_eq!(path.legs[1], vec![CfiStep::new(4), CfiStep::new(2)]);
        assert!(!cfi.is_range());
    }

    #[test]
    fn test_parse_two_leg_path_with_assertions() {
        let cfi = parse("/6/4[chap01]!/4[body01]/10[para05]/2:3").unwrap();
        let path = path(&cfi);
        assert_eq!(
            path.legs[0],
            vec![CfiStep::new(6), CfiStep::with_id(4, "chap01")]
        );
        assert_eq!(
            path.legs[1],
            vec![
                CfiStep::with_id(4, "body01"),
                CfiStep::with_id(10, "para05"),
                CfiStep::with_offset(2, 3),
            ]
        );
    }

    #[test]
    fn test_parse_cfi_with_text_assertion() {
        let cfi = parse("epubcfi(/6/4!/4/2/1:42[hello,world])").unwrap();
        let step = path(&cfi).last_step().unwrap();
        assert_eq!(step.offset, Some(42));
        let text = step.text.as_ref().unwrap();
        assert_eq!(text.prefix.as_deref(), Some("hello"));
        assert_eq!(text.suffix.as_deref(), Some("world"));
    }

    #[test]
    fn test_parse_side_bias() {
        let cfi = parse("epubcfi(/6/4!/4/2/1:3[;s=a])").unwrap();
        let step = path(&cfi).last_step().unwrap();
        assert_eq!(step.side, Some(Side::After));
        assert!(step.text.is_none());

        let cfi = parse("epubcfi(/6/4!/4[p1;s=b])").unwrap();
        let step = path(&cfi).last_step().unwrap();
        assert_eq!(step.id.as_deref(), Some("p1"));
        assert_eq!(step.side, Some(Side::Before));

        assert_eq!(
            parse("epubcfi(/6/4!/4[p1;s=x])"),
            Err(CfiParseError::InvalidSide("x".into()))
        );
    }

    #[test]
    fn test_unknown_parameters_are_ignored() {
        let cfi = parse("epubcfi(/6/4!/4/2/1:3[xx;vnd.foo=bar])").unwrap();
        let step = path(&cfi).last_step().unwrap();
        assert_eq!(step.text.as_ref().unwrap().prefix.as_deref(), Some("xx"));
        assert_eq!(step.side, None);
    }

    #[test]
    fn test_parse_cfi_range() {
        let cfi = parse("epubcfi(/6/4!/4/2,/1:0,/1:10)").unwrap();
        let range = range(&cfi);
        assert_eq!(range.parent.legs.len(), 2);
        assert_eq!(range.start.last_step().unwrap().offset, Some(0));
        assert_eq!(range.end.last_step().unwrap().offset, Some(10));
    }

    #[test]
    fn test_offset_only_range_is_normalized() {
        let cfi = parse("epubcfi(/6/4!/4/2/1,:5,:9)").unwrap();
        assert_eq!(cfi.to_string(), "epubcfi(/6/4!/4/2,/1:5,/1:9)");

        let cfi = parse("epubcfi(/6/4!/4/2/3,:5,/2/1:1)").unwrap();
        assert_eq!(cfi.to_string(), "epubcfi(/6/4!/4/2,/3:5,/3/2/1:1)");
    }

    #[test]
    fn test_range_with_empty_parent_leg() {
        let cfi = parse("epubcfi(/6/4!,/2/1:0,/4/1:3)").unwrap();
        let range = range(&cfi);
        assert_eq!(range.parent.legs.len(), 2);
        assert!(range.parent.legs[1].is_empty());
        assert_eq!(cfi.to_string(), "epubcfi(/6/4!,/2/1:0,/4/1:3)");
    }

    #[test]
    fn test_parse_cfi_temporal_offset() {
        let cfi = parse("epubcfi(/6/4!/4~12.5)").unwrap();
        let step = path(&cfi).last_step().unwrap();
        assert_eq!(step.temporal.unwrap().seconds, 12.5);
    }

    #[test]
    fn test_parse_cfi_spatial_offset() {
        let cfi = parse("epubcfi(/6/4!/4@50.5:25.0)").unwrap();
        let spatial = path(&cfi).last_step().unwrap().spatial.unwrap();
        assert_eq!(spatial.x, 50.5);
        assert_eq!(spatial.y, 25.0);
    }

    #[test]
    fn test_roundtrip() {
        for original in [
            "epubcfi(/6/4[chapter1]!/4/2/1:42)",
            "epubcfi(/6/4!/4/2,/1:0,/1:10)",
            "epubcfi(/6/14[chap05ref]!/4[body01]/10/2,/1:5,/3:8)",
            "epubcfi(/6/4!/4/2/1:3[xx,y;s=a])",
            "epubcfi(/6/4!/4/2/1:3[,y])",
            "epubcfi(/6/4!/4[a^[b^]]/6~3.5@10:20)",
            "epubcfi(/2/4!/6!/8/1:0)",
        ] {
            let cfi = parse(original).unwrap();
            assert_eq!(cfi.to_string(), original);
            assert_eq!(parse(&cfi.to_string()).unwrap(), cfi);
        }
    }

    #[test]
    fn test_whitespace_and_bare_form() {
        let wrapped = parse("  epubcfi(/6/4!/4/2/1:42) ").unwrap();
        let bare = parse("/6/4!/4/2/1:42").unwrap();
        assert_eq!(wrapped, bare);
    }

    #[test]
    fn test_error_empty() {
        assert_eq!(parse(""), Err(CfiParseError::Empty));
        assert_eq!(parse("epubcfi()"), Err(CfiParseError::EmptyLeg(8)));
    }

    #[test]
    fn test_error_missing_paren() {
        assert_eq!(parse("epubcfi(/6/4"), Err(CfiParseError::MissingClosingParen));
    }

    #[test]
    fn test_error_unbalanced_indirection() {
        assert!(matches!(parse("epubcfi(/6/4!!/4)"), Err(CfiParseError::EmptyLeg(_))));
        assert!(matches!(parse("epubcfi(/6/4!)"), Err(CfiParseError::EmptyLeg(_))));
        assert!(matches!(parse("epubcfi(!/4)"), Err(CfiParseError::EmptyLeg(_))));
    }

    #[test]
    fn test_error_malformed_steps() {
        assert_eq!(parse("epubcfi(/x)"), Err(CfiParseError::ExpectedNumber(9)));
        assert_eq!(
            parse("epubcfi(/4/1:)"),
            Err(CfiParseError::InvalidCharacterOffset(13))
        );
        assert!(matches!(
            parse("epubcfi(/4/1[abc)"),
            Err(CfiParseError::UnclosedBracket(_))
        ));
        assert!(matches!(
            parse("epubcfi(/4@5)"),
            Err(CfiParseError::InvalidSpatialOffset(_))
        ));
        assert!(matches!(
            parse("epubcfi(/4/2) trailing"),
            Err(CfiParseError::UnexpectedChar(' ', _))
        ));
    }

    #[test]
    fn test_error_misplaced_offset() {
        assert!(matches!(
            parse("epubcfi(/4/1:3/2)"),
            Err(CfiParseError::MisplacedOffset(_))
        ));
        assert!(matches!(
            parse("epubcfi(/6/4:1!/4)"),
            Err(CfiParseError::MisplacedOffset(_))
        ));
        assert!(matches!(
            parse("epubcfi(/4/1:3,/2,/4)"),
            Err(CfiParseError::MisplacedOffset(_))
        ));
    }

    #[test]
    fn test_error_range_shape() {
        assert_eq!(parse("epubcfi(/4,/2)"), Err(CfiParseError::InvalidRange));
        assert_eq!(parse("epubcfi(/4,/2,/6,/8)"), Err(CfiParseError::InvalidRange));
        assert_eq!(parse("epubcfi(,:1,:2)"), Err(CfiParseError::InvalidRange));
    }

    #[test]
    fn test_error_backwards_range() {
        assert_eq!(parse("epubcfi(/4/2,/1:5,/1:2)"), Err(CfiParseError::InvalidRange));
        assert_eq!(parse("epubcfi(/4,/6/1:0,/2/1:3)"), Err(CfiParseError::InvalidRange));
        assert_eq!(parse("epubcfi(/4/2/1,:9,:3)"), Err(CfiParseError::InvalidRange));

        // collapsed ranges are allowed
        assert!(parse("epubcfi(/4/2,/1:5,/1:5)").is_ok());
    }

    #[test]
    fn test_error_range_across_documents() {
        assert_eq!(parse("epubcfi(/6/4,/2!/4,/6)"), Err(CfiParseError::InvalidRange));
        assert_eq!(
            parse("epubcfi(/2,/2/1:0,/4!/2/2/1:1)"),
            Err(CfiParseError::InvalidRange)
        );
    }

    #[test]
    fn test_escaped_bracket() {
        let cfi = parse("epubcfi(/6/4[test^]value]!/4)").unwrap();
        assert_eq!(cfi.outer_leg().unwrap()[1].id.as_deref(), Some("test]value"));
    }

    #[test]
    fn test_is_cfi() {
        assert!(is_cfi("epubcfi(/6/4)"));
        assert!(!is_cfi("/6/4"));
        assert!(!is_cfi("chapter1.xhtml#p3"));
    }
}
