//! Category value distribution rules.

use std::collections::{BTreeMap, BTreeSet};

use crawlqa_model::{Items, Outcome, RuleResult, StatSeries, StatTable};
use tracing::debug;

use crate::helpers::{sorted_counts, threshold_percent, value_counts};

pub const DEFAULT_MAX_UNIQUES: usize = 10;

/// Value counts per category column, missing values excluded.
pub fn get_coverage_per_category(items: &Items, columns: &[String]) -> RuleResult {
    let mut result =
        RuleResult::new("Coverage For Scraped Categories").with_items_count(items.len());
    if columns.is_empty() {
        result.add_info(Outcome::Skipped);
        return result;
    }

    for column in columns {
        let Ok(cells) = items.column_texts(column) else {
            debug!(column = %column, "category column not found");
            continue;
        };
        let counts = value_counts(&cells, false);
        result.add_info(format!("{} categories in '{column}'", counts.len()));
        result.add_stat(StatSeries::new(column.clone(), sorted_counts(counts, true)));
    }
    result
}

/// Compares the normalised value distribution of each category column.
///
/// Differences above `err_thr` are reported as warnings, not errors: a
/// category shift alone does not make a job bad.
pub fn get_difference(
    source: &Items,
    target: &Items,
    columns: &[String],
    err_thr: f64,
    warn_thr: f64,
) -> RuleResult {
    let mut result = RuleResult::new("Category Coverage Difference").with_items_count(source.len());
    if columns.is_empty() {
        result.add_info(Outcome::Skipped);
        return result;
    }

    for column in columns {
        let (Ok(source_cells), Ok(target_cells)) =
            (source.column_texts(column), target.column_texts(column))
        else {
            debug!(column = %column, "category column not found in both tables");
            continue;
        };
        let table = coverage_table(column, &source_cells, &target_cells);

        let differences: Vec<(String, f64)> = table
            .rows
            .iter()
            .map(|(label, values)| (label.clone(), (values[0] - values[1]).abs()))
            .filter(|(_, diff)| *diff > warn_thr)
            .collect();
        let significant = differences.iter().filter(|(_, diff)| *diff > err_thr).count();

        result.add_stat(table);
        if !differences.is_empty() {
            result.add_stat(StatSeries::new(
                format!(
                    "Coverage difference more than {} for {column}",
                    threshold_percent(warn_thr)
                ),
                differences,
            ));
        }
        if significant > 0 {
            result.add_warning(format!(
                "The difference is greater than {} for {significant} value(s) of {column}",
                threshold_percent(err_thr)
            ));
        }
    }
    result
}

/// Normalised counts of both tables side by side, ordered by source then
/// target share.
fn coverage_table(
    column: &str,
    source_cells: &[Option<String>],
    target_cells: &[Option<String>],
) -> StatTable {
    let source = normalise(value_counts(source_cells, true), source_cells.len());
    let target = normalise(value_counts(target_cells, true), target_cells.len());

    let labels: BTreeSet<&String> = source.keys().chain(target.keys()).collect();
    let mut rows: Vec<(String, Vec<f64>)> = labels
        .into_iter()
        .map(|label| {
            let share = |counts: &BTreeMap<String, f64>| counts.get(label).copied().unwrap_or(0.0);
            (label.clone(), vec![share(&source), share(&target)])
        })
        .collect();
    rows.sort_by(|a, b| {
        a.1[0]
            .total_cmp(&b.1[0])
            .then_with(|| a.1[1].total_cmp(&b.1[1]))
    });

    StatTable::new(
        format!("Coverage for {column}"),
        vec!["source".to_string(), "target".to_string()],
        rows,
    )
}

fn normalise(counts: BTreeMap<String, usize>, total: usize) -> BTreeMap<String, f64> {
    counts
        .into_iter()
        .map(|(label, count)| (label, count as f64 / total as f64))
        .collect()
}

/// Columns with at most `max_uniques` distinct values, `nan` included.
pub fn get_categories(items: &Items, max_uniques: usize) -> RuleResult {
    let mut result = RuleResult::new("Categories").with_items_count(items.len());
    for column in items.columns() {
        let Ok(cells) = items.column_texts(&column) else {
            continue;
        };
        let counts = value_counts(&cells, true);
        if counts.len() <= max_uniques {
            result.add_stat(StatSeries::new(column, sorted_counts(counts, false)));
        }
    }

    if result.stats.is_empty() {
        result.add_info("Categories were not found");
    } else {
        result.add_info(format!("{} category field(s)", result.stats.len()));
    }
    result
}

#[cfg(test)]
mod tests {
    use crawlqa_model::Stat;
    use serde_json::{Value, json};

    use super::*;

    fn items(rows: Value) -> Items {
        let Value::Array(rows) = rows else {
            panic!("rows must be an array");
        };
        Items::from_rows("memory", rows, false).expect("items")
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn coverage_per_category_excludes_missing() {
        let items = items(json!([
            {"cat": "a"}, {"cat": "b"}, {"cat": "b"}, {"cat": null}
        ]));
        let result = get_coverage_per_category(&items, &columns(&["cat"]));
        assert_eq!(result.info()[0].summary, "2 categories in 'cat'");
        let Stat::Series(series) = &result.stats[0] else {
            panic!("expected a series");
        };
        assert_eq!(series.name, "cat");
        assert_eq!(
            series.entries,
            [("a".to_string(), 1.0), ("b".to_string(), 2.0)]
        );
    }

    #[test]
    fn no_columns_is_skipped() {
        let items = items(json!([{"cat": "a"}]));
        assert!(get_coverage_per_category(&items, &[]).is_skipped());
        assert!(get_difference(&items, &items, &[], 0.2, 0.1).is_skipped());
    }

    #[test]
    fn large_shift_is_only_a_warning() {
        let source = items(json!([
            {"cat": "a"}, {"cat": "a"}, {"cat": "a"}, {"cat": "b"}
        ]));
        let target = items(json!([
            {"cat": "b"}, {"cat": "b"}, {"cat": "b"}, {"cat": null}
        ]));
        let result = get_difference(&source, &target, &columns(&["cat"]), 0.2, 0.1);

        assert!(!result.has_errors());
        assert_eq!(
            result.warnings()[0].summary,
            "The difference is greater than 20% for 3 value(s) of cat"
        );
        let Stat::Table(table) = &result.stats[0] else {
            panic!("expected a table");
        };
        assert_eq!(table.name, "Coverage for cat");
        let labels: Vec<&str> = table.rows.iter().map(|(label, _)| label.as_str()).collect();
        assert_eq!(labels, ["nan", "b", "a"]);
        assert_eq!(table.row("a"), Some(&[0.75, 0.0][..]));
        assert_eq!(
            result.stats[1].name(),
            "Coverage difference more than 10% for cat"
        );
        assert_eq!(result.stats[1].len(), 3);
    }

    #[test]
    fn category_fields_are_low_cardinality_columns() {
        let rows: Vec<Value> = (0..12)
            .map(|i| json!({"id": i, "in_stock": i % 2 == 0, "size": null}))
            .collect();
        let items = Items::from_rows("memory", rows, false).expect("items");
        let result = get_categories(&items, DEFAULT_MAX_UNIQUES);

        let names: Vec<&str> = result.stats.iter().map(Stat::name).collect();
        assert_eq!(names, ["in_stock", "size"]);
        assert_eq!(result.info()[0].summary, "2 category field(s)");

        let unique = items_with_unique_ids();
        assert_eq!(
            get_categories(&unique, 1).info()[0].summary,
            "Categories were not found"
        );
    }

    fn items_with_unique_ids() -> Items {
        Items::from_rows("memory", vec![json!({"id": 1}), json!({"id": 2})], false)
            .expect("items")
    }
}
