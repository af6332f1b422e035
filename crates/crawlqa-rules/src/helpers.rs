//! Small numeric and formatting helpers shared by rules.

use std::collections::BTreeMap;

use crawlqa_model::round2;

/// Label used for missing cells in value counts and messages.
pub const MISSING: &str = "nan";

/// Relative difference between two non-negative values, rounded to two
/// decimals. Zero when both are zero.
pub fn ratio_diff(source: f64, target: f64) -> f64 {
    if source == 0.0 && target == 0.0 {
        return 0.0;
    }
    let source = if source == 0.0 { 1e-14 } else { source };
    let (high, low) = if source >= target {
        (source, target)
    } else {
        (target, source)
    };
    round2((high - low) / high)
}

/// `|a - b| / max(|a|, |b|)`, zero for equal values.
pub fn relative_difference(a: f64, b: f64) -> f64 {
    if a == b {
        return 0.0;
    }
    (a - b).abs() / a.abs().max(b.abs())
}

/// `part` as a percentage of `total`, zero for an empty total.
pub fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Threshold rendered as a whole percentage, e.g. `0.1` as `10%`.
pub fn threshold_percent(threshold: f64) -> String {
    format!("{:.0}%", threshold * 100.0)
}

/// `'a', 'b'` listing.
pub fn quoted_list<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|value| format!("'{}'", value.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Counts of each cell text. Missing cells count under [`MISSING`] when
/// `with_missing` is set and are dropped otherwise.
pub fn value_counts(cells: &[Option<String>], with_missing: bool) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for cell in cells {
        let label = match cell {
            Some(text) => text.clone(),
            None if with_missing => MISSING.to_string(),
            None => continue,
        };
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Value counts ordered by count, ties by label.
pub fn sorted_counts(counts: BTreeMap<String, usize>, ascending: bool) -> Vec<(String, f64)> {
    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    if ascending {
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    } else {
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    }
    entries
        .into_iter()
        .map(|(label, count)| (label, count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_diff_is_symmetric_and_rounded() {
        assert_eq!(ratio_diff(0.0, 0.0), 0.0);
        assert_eq!(ratio_diff(100.0, 90.0), 0.1);
        assert_eq!(ratio_diff(90.0, 100.0), 0.1);
        assert_eq!(ratio_diff(3.0, 1.0), 0.67);
        assert_eq!(ratio_diff(0.0, 5.0), 1.0);
    }

    #[test]
    fn relative_difference_uses_larger_value() {
        assert_eq!(relative_difference(10.0, 10.0), 0.0);
        assert_eq!(relative_difference(10.0, 8.0), 0.2);
        assert!(relative_difference(100.0, 90.0) <= 0.1 + f64::EPSILON);
    }

    #[test]
    fn value_counts_handle_missing() {
        let cells = vec![Some("a".to_string()), None, Some("a".to_string())];
        assert_eq!(value_counts(&cells, false).len(), 1);
        assert_eq!(value_counts(&cells, true)[MISSING], 1);
        let sorted = sorted_counts(value_counts(&cells, true), false);
        assert_eq!(sorted[0], ("a".to_string(), 2.0));
    }

    #[test]
    fn lists_are_quoted() {
        assert_eq!(quoted_list(&["a", "b"]), "'a', 'b'");
        assert_eq!(threshold_percent(0.1), "10%");
    }
}
