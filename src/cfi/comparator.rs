//! CFI Comparison and Ordering
//!
//! Implements comparison logic for CFIs to enable sorting annotations
//! and determining reading progress order.
//!
//! Ordering ignores id and text assertions, so it is exposed as free
//! functions rather than `Ord` impls that would disagree with `PartialEq`.

use std::cmp::Ordering;

use super::parser::{parse, CfiParseError};
use super::types::*;

/// Compare two CFIs in document order.
///
/// Ranges are compared by their start, then by their end.
pub fn compare(a: &Cfi, b: &Cfi) -> Ordering {
    if a.is_range() || b.is_range() {
        return compare_paths(&a.collapse(false), &b.collapse(false))
            .then_with(|| compare_paths(&a.collapse(true), &b.collapse(true)));
    }
    compare_paths(&a.collapse(false), &b.collapse(false))
}

/// Compare two paths leg by leg, step by step
pub fn compare_paths(a: &CfiPath, b: &CfiPath) -> Ordering {
    let empty = Vec::new();
    for i in 0..a.legs.len().max(b.legs.len()) {
        let p = a.legs.get(i).unwrap_or(&empty);
        let q = b.legs.get(i).unwrap_or(&empty);
        let cmp = compare_legs(p, q);
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    Ordering::Equal
}

fn compare_legs(p: &[CfiStep], q: &[CfiStep]) -> Ordering {
    let max_index = p.len().max(q.len());
    for i in 0..max_index {
        let (x, y) = match (p.get(i), q.get(i)) {
            (Some(x), Some(y)) => (x, y),
            // A path that stops here is an ancestor of the other
            (None, _) => return Ordering::Less,
            (_, None) => return Ordering::Greater,
        };

        let cmp = x.index.cmp(&y.index);
        if cmp != Ordering::Equal {
            return cmp;
        }

        if i + 1 == max_index {
            let cmp = compare_terminal(x, y);
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
    }
    Ordering::Equal
}

/// Compare the qualifiers of two steps with the same index
fn compare_terminal(x: &CfiStep, y: &CfiStep) -> Ordering {
    x.offset
        .cmp(&y.offset)
        .then_with(|| {
            compare_option(x.temporal, y.temporal, |a, b| a.seconds.total_cmp(&b.seconds))
        })
        .then_with(|| {
            compare_option(x.spatial, y.spatial, |a, b| {
                a.x.total_cmp(&b.x).then_with(|| a.y.total_cmp(&b.y))
            })
        })
        .then_with(|| side_rank(x.side).cmp(&side_rank(y.side)))
}

/// Absent values sort first, matching `Option`'s own ordering
fn compare_option<T: Copy>(a: Option<T>, b: Option<T>, cmp: impl Fn(T, T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp(a, b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn side_rank(side: Option<Side>) -> u8 {
    match side {
        Some(Side::Before) => 0,
        None => 1,
        Some(Side::After) => 2,
    }
}

/// Determine if CFI `a` comes before CFI `b` in reading order
pub fn is_before(a: &Cfi, b: &Cfi) -> bool {
    compare(a, b) == Ordering::Less
}

/// Determine if CFI `a` comes after CFI `b` in reading order
pub fn is_after(a: &Cfi, b: &Cfi) -> bool {
    compare(a, b) == Ordering::Greater
}

/// Check if a CFI falls within a range (inclusive on both ends)
pub fn is_in_range(cfi: &Cfi, start: &Cfi, end: &Cfi) -> bool {
    compare(cfi, start) != Ordering::Less && compare(cfi, end) != Ordering::Greater
}

/// Compare two CFI strings, returning their ordering
pub fn compare_strs(a: &str, b: &str) -> Result<Ordering, CfiParseError> {
    Ok(compare(&parse(a)?, &parse(b)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(a: &str, b: &str) -> Ordering {
        compare_strs(a, b).unwrap()
    }

    #[test]
    fn test_cfi_ordering_same_chapter() {
        let a = parse("epubcfi(/6/4!/4/2/1:10)").unwrap();
        let b = parse("epubcfi(/6/4!/4/2/1:20)").unwrap();

        assert!(is_before(&a, &b));
        assert!(is_after(&b, &a));
    }

    #[test]
    fn test_offset_ordering_in_bare_form() {
        assert_eq!(cmp("/6/4/2:0", "/6/4/2:5"), Ordering::Less);
    }

    #[test]
    fn test_cfi_ordering_different_chapters() {
        assert_eq!(cmp("epubcfi(/6/4!/4/2)", "epubcfi(/6/6!/4/2)"), Ordering::Less);
        assert_eq!(cmp("epubcfi(/6/10!/4/2)", "epubcfi(/6/8!/4/2)"), Ordering::Greater);
    }

    #[test]
    fn test_cfi_ordering_nested_depth() {
        // Deeper path comes after shallower path
        assert_eq!(cmp("epubcfi(/6/4!/4/2)", "epubcfi(/6/4!/4/2/1)"), Ordering::Less);
        assert_eq!(cmp("epubcfi(/6/4)", "epubcfi(/6/4!/4)"), Ordering::Less);
    }

    #[test]
    fn test_assertions_do_not_affect_order() {
        assert_eq!(
            cmp("epubcfi(/6/4[a]!/4[b]/2:3[x])", "epubcfi(/6/4!/4/2:3)"),
            Ordering::Equal
        );
    }

    #[test]
    fn test_side_bias_ordering() {
        assert_eq!(cmp("/4/1:3[;s=b]", "/4/1:3"), Ordering::Less);
        assert_eq!(cmp("/4/1:3", "/4/1:3[;s=a]"), Ordering::Less);
    }

    #[test]
    fn test_temporal_and_spatial_ordering() {
        assert_eq!(cmp("/4~1.5", "/4~2"), Ordering::Less);
        assert_eq!(cmp("/4", "/4~0"), Ordering::Less);
        assert_eq!(cmp("/4@10:5", "/4@10:2.5"), Ordering::Greater);
    }

    #[test]
    fn test_antisymmetry() {
        let cfis = [
            "epubcfi(/6/4!/4/2/1:0)",
            "epubcfi(/6/4!/4/2/1:9)",
            "epubcfi(/6/4!/4/2,/1:0,/3:2)",
            "epubcfi(/6/4!/4/10)",
            "epubcfi(/6/6)",
        ];
        for a in cfis {
            for b in cfis {
                assert_eq!(cmp(a, b), cmp(b, a).reverse(), "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_range_compares_by_start_then_end() {
        let range = parse("epubcfi(/6/4!/4/2,/1:0,/1:10)").unwrap();
        let start = Cfi::Path(range.collapse(false));
        let end = Cfi::Path(range.collapse(true));

        assert!(compare(&start, &end) != Ordering::Greater);
        assert_eq!(
            cmp("epubcfi(/6/4!/4/2,/1:0,/1:10)", "epubcfi(/6/4!/4/2/1:0)"),
            Ordering::Greater
        );
        assert_eq!(
            cmp("epubcfi(/6/4!/4/2,/1:0,/1:10)", "epubcfi(/6/4!/4/2,/1:0,/1:12)"),
            Ordering::Less
        );
    }

    #[test]
    fn test_is_in_range() {
        let start = parse("epubcfi(/6/4!/4/2/1:0)").unwrap();
        let end = parse("epubcfi(/6/4!/4/6/1:0)").unwrap();
        let inside = parse("epubcfi(/6/4!/4/4)").unwrap();
        let outside = parse("epubcfi(/6/6!/4/2)").unwrap();

        assert!(is_in_range(&inside, &start, &end));
        assert!(is_in_range(&start, &start, &end));
        assert!(!is_in_range(&outside, &start, &end));
    }

    #[test]
    fn test_sort_annotations() {
        let mut cfis: Vec<Cfi> = [
            "epubcfi(/6/6!/4/2)",
            "epubcfi(/6/4!/4/2/1:20)",
            "epubcfi(/6/4!/4/2/1:10)",
        ]
        .iter()
        .map(|s| parse(s).unwrap())
        .collect();

        cfis.sort_by(compare);
        let sorted: Vec<String> = cfis.iter().map(ToString::to_string).collect();
        assert_eq!(
            sorted,
            [
                "epubcfi(/6/4!/4/2/1:10)",
                "epubcfi(/6/4!/4/2/1:20)",
                "epubcfi(/6/6!/4/2)",
            ]
        );
    }

    #[test]
    fn test_compare_invalid_string() {
        assert!(compare_strs("epubcfi(/6/4", "epubcfi(/6/4)").is_err());
    }
}
