//! Field coverage rules.

use std::collections::BTreeSet;

use crawlqa_model::{Items, JobMetadata, Message, RuleResult, StatSeries};

use crate::helpers::threshold_percent;

/// Non-missing counts for every field; fields without any value are errors.
pub fn check_fields_coverage(items: &Items) -> RuleResult {
    let mut result = RuleResult::new("Fields Coverage").with_items_count(items.len());

    let mut coverage: Vec<(String, usize)> = items.field_counts().into_iter().collect();
    coverage.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let empty = coverage.iter().filter(|(_, count)| *count == 0).count();

    result.add_stat(StatSeries::new(
        format!("Fields coverage for {} items", items.len()),
        coverage
            .into_iter()
            .map(|(field, count)| (field, count as f64))
            .collect(),
    ));
    if empty > 0 {
        result.add_error(format!("{empty} empty field(s)"));
    }
    result
}

/// Fields present in only one of the two tables.
pub fn compare_scraped_fields(source: &Items, target: &Items) -> RuleResult {
    let mut result = RuleResult::new("Scraped Fields");
    let source_fields: BTreeSet<String> = source.columns().into_iter().collect();
    let target_fields: BTreeSet<String> = target.columns().into_iter().collect();

    let missing: Vec<&String> = target_fields.difference(&source_fields).collect();
    if !missing.is_empty() {
        result.add_error(
            Message::new(format!("Missing - {}", join(&missing)))
                .with_detailed(coverage_lines(target, &missing)),
        );
    }

    let new: Vec<&String> = source_fields.difference(&target_fields).collect();
    if !new.is_empty() {
        result.add_info(
            Message::new(format!("New - {}", join(&new))).with_detailed(coverage_lines(source, &new)),
        );
    }
    result
}

fn join(fields: &[&String]) -> String {
    fields
        .iter()
        .map(|field| field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn coverage_lines(items: &Items, fields: &[&String]) -> String {
    fields
        .iter()
        .map(|field| {
            let count = items.non_missing_count(field).unwrap_or(0);
            let percent = if items.is_empty() {
                0
            } else {
                count * 100 / items.len()
            };
            format!("{field} - coverage - {percent}% - {count} items")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compares per-field coverage ratios of two jobs.
pub fn get_difference(
    source: &JobMetadata,
    target: &JobMetadata,
    warn_thr: f64,
    err_thr: f64,
) -> RuleResult {
    let mut result = RuleResult::new("Coverage Difference");

    let fields: BTreeSet<&String> = source
        .field_counts
        .keys()
        .chain(target.field_counts.keys())
        .collect();
    let mut differences: Vec<(String, f64)> = fields
        .into_iter()
        .map(|field| {
            let source_ratio = field_ratio(source, field);
            let target_ratio = field_ratio(target, field);
            (field.clone(), (source_ratio - target_ratio).abs())
        })
        .collect();
    differences.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let errors = differences.iter().filter(|(_, diff)| *diff > err_thr).count();
    let warnings = differences
        .iter()
        .filter(|(_, diff)| *diff > warn_thr && *diff <= err_thr)
        .count();

    result.add_stat(StatSeries::new("Coverage difference between jobs", differences));
    if errors > 0 {
        result.add_error(format!(
            "The difference is greater than {} for {errors} field(s)",
            threshold_percent(err_thr)
        ));
    }
    if warnings > 0 {
        result.add_warning(format!(
            "The difference is between {} and {} for {warnings} field(s)",
            threshold_percent(warn_thr),
            threshold_percent(err_thr)
        ));
    }
    result
}

fn field_ratio(job: &JobMetadata, field: &str) -> f64 {
    let items = job.effective_items_count();
    if items == 0 {
        return 0.0;
    }
    job.field_counts.get(field).copied().unwrap_or(0) as f64 / items as f64
}
