//! Dotted-numeric version comparison.
//!
//! Versions are compared segment by segment as unsigned integers. Missing
//! trailing segments count as 0, so `1.0` and `1.0.0` are equal. A segment
//! takes its leading ASCII digits; a segment with none parses as 0.

use std::cmp::Ordering;

/// Compare two dotted-numeric version strings.
///
/// # Example
///
/// ```
/// use std::cmp::Ordering;
/// use roseveil::package::compare_versions;
///
/// assert_eq!(compare_versions("1.2.0", "1.10.0"), Ordering::Less);
/// assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
/// assert_eq!(compare_versions("2", "1.9.9"), Ordering::Greater);
/// ```
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = segments(a);
    let right = segments(b);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Whether `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare_versions(candidate, current) == Ordering::Greater
}

fn segments(version: &str) -> Vec<u64> {
    version.trim().split('.').map(segment_value).collect()
}

fn segment_value(segment: &str) -> u64 {
    let trimmed = segment.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let digits = &trimmed[..end];
    if digits.is_empty() {
        return 0;
    }
    // Absurdly long segments saturate rather than wrap.
    digits.parse().unwrap_or(u64::MAX)
}
