//! Boolean field distributions.

use std::collections::BTreeSet;

use crawlqa_model::{Items, Outcome, RuleResult, StatTable};

use crate::helpers::threshold_percent;

/// `(true, false)` shares among non-missing cells.
fn frequencies(items: &Items, field: &str) -> (f64, f64) {
    let cells = items.column_bools(field).unwrap_or_default();
    let present: Vec<bool> = cells.into_iter().flatten().collect();
    if present.is_empty() {
        return (0.0, 0.0);
    }
    let trues = present.iter().filter(|value| **value).count() as f64;
    let total = present.len() as f64;
    (trues / total, (total - trues) / total)
}

/// Compares the share of `true` values of boolean fields found in both tables.
pub fn compare_boolean_fields(
    source: &Items,
    target: &Items,
    err_thr: f64,
    warn_thr: f64,
) -> RuleResult {
    let mut result = RuleResult::new("Boolean Fields").with_items_count(source.len());
    let source_fields: BTreeSet<String> = source.boolean_columns().into_iter().collect();
    let target_fields: BTreeSet<String> = target.boolean_columns().into_iter().collect();
    let common: Vec<&String> = source_fields.intersection(&target_fields).collect();
    if common.is_empty() {
        result.add_info(Outcome::Skipped);
        return result;
    }

    let mut rows = Vec::with_capacity(common.len() * 2);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for field in common {
        let (source_true, source_false) = frequencies(source, field);
        let (target_true, target_false) = frequencies(target, field);
        rows.push((format!("{field}_source"), vec![source_true, source_false]));
        rows.push((format!("{field}_target"), vec![target_true, target_false]));

        let difference = (source_true - target_true).abs();
        if difference > err_thr {
            errors.push(field.as_str());
        } else if difference > warn_thr {
            warnings.push(field.as_str());
        }
    }
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    result.add_stat(StatTable::new(
        "Coverage for boolean fields",
        vec!["true".to_string(), "false".to_string()],
        rows,
    ));

    if !errors.is_empty() {
        result.add_error(format!(
            "{} relative frequencies differ by more than {}",
            errors.join(", "),
            threshold_percent(err_thr)
        ));
    }
    if !warnings.is_empty() {
        result.add_warning(format!(
            "{} relative frequencies differ by {}-{}",
            warnings.join(", "),
            threshold_percent(warn_thr),
            threshold_percent(err_thr)
        ));
    }
    result
}

#[cfg(test)]
mod tests {
    use crawlqa_model::Stat;
    use serde_json::{Value, json};

    use super::*;

    fn items(key: &str, flags: &[(bool, bool)]) -> Items {
        let rows: Vec<Value> = flags
            .iter()
            .map(|(in_stock, on_sale)| json!({"in_stock": in_stock, "on_sale": on_sale, "name": "x"}))
            .collect();
        Items::from_rows(key, rows, false).expect("items")
    }

    #[test]
    fn true_share_differences_are_graded() {
        let source = items(
            "s",
            &[(true, true), (true, true), (true, false), (true, false)],
        );
        let target = items(
            "t",
            &[(true, true), (true, true), (true, false), (false, false)],
        );
        let result = compare_boolean_fields(&source, &target, 0.10, 0.05);

        assert_eq!(
            result.errors()[0].summary,
            "in_stock relative frequencies differ by more than 10%"
        );
        assert!(result.warnings().is_empty());
        let Stat::Table(table) = &result.stats[0] else {
            panic!("expected a table");
        };
        assert_eq!(table.name, "Coverage for boolean fields");
        let labels: Vec<&str> = table.rows.iter().map(|(label, _)| label.as_str()).collect();
        assert_eq!(
            labels,
            ["in_stock_source", "in_stock_target", "on_sale_source", "on_sale_target"]
        );
        assert_eq!(table.row("in_stock_target"), Some(&[0.75, 0.25][..]));
    }

    #[test]
    fn small_shift_is_a_warning() {
        let mut source_flags = vec![(true, true); 10];
        let mut target_flags = vec![(true, true); 10];
        source_flags.extend([(false, true); 10]);
        target_flags.extend([(false, true); 8]);
        target_flags.extend([(true, true); 2]);
        let result = compare_boolean_fields(
            &items("s", &source_flags),
            &items("t", &target_flags),
            0.10,
            0.05,
        );
        assert_eq!(
            result.warnings()[0].summary,
            "in_stock relative frequencies differ by 5%-10%"
        );
        assert!(!result.has_errors());
    }

    #[test]
    fn without_common_boolean_fields_rule_is_skipped() {
        let source = items("s", &[(true, true)]);
        let target = Items::from_rows("t", vec![json!({"in_stock": "yes"})], false).expect("items");
        assert!(compare_boolean_fields(&source, &target, 0.10, 0.05).is_skipped());
    }
}
