//! Duplicate detection.
//!
//! Rows are grouped by the texts of one or more columns. Every group with
//! more than one row is a duplicate cluster. Rows missing all of a group's
//! columns have nothing to compare and are left out.

use std::collections::BTreeMap;

use crawlqa_model::{
    ErrorKeys, Items, Message, Outcome, RuleResult, Tag, TaggedFields, fields_for, first_field,
};
use tracing::debug;

use crate::helpers::MISSING;

/// Finds rows sharing the same values in `columns`.
pub fn find_by(items: &Items, columns: &[&str]) -> RuleResult {
    let group: Vec<String> = columns.iter().map(|column| (*column).to_string()).collect();
    find_by_groups(items, &[group])
}

/// Runs [`find_by`] once per column group, one ERROR per group with clusters.
pub fn find_by_groups(items: &Items, groups: &[Vec<String>]) -> RuleResult {
    let mut result = RuleResult::new("Duplicates").with_items_count(items.len());
    for group in groups {
        let Some(clusters) = duplicate_clusters(items, group) else {
            debug!(columns = ?group, "duplicate check skipped, column not found");
            continue;
        };
        if clusters.is_empty() {
            continue;
        }

        let mut errors = ErrorKeys::new();
        for (values, rows) in &clusters {
            let cause = group
                .iter()
                .zip(values)
                .map(|(column, value)| {
                    format!("'{}' `{column}`", value.as_deref().unwrap_or(MISSING))
                })
                .collect::<Vec<_>>()
                .join(", ");
            errors
                .entry(format!("same {cause}"))
                .or_default()
                .extend(rows.iter().map(|row| items.keys()[*row].clone()));
        }
        result.add_error(
            Message::new(format!(
                "{} contains {} duplicated value(s)",
                group.join(", "),
                clusters.len()
            ))
            .with_errors(errors),
        );
    }
    result
}

/// Uniqueness of every `unique` tagged column.
pub fn find_by_unique(items: &Items, tags: &TaggedFields) -> RuleResult {
    let unique = fields_for(tags, Tag::Unique);
    if unique.is_empty() {
        return skipped("Uniqueness", items);
    }
    let groups: Vec<Vec<String>> = unique.iter().map(|column| vec![column.clone()]).collect();
    let mut result = find_by_groups(items, &groups);
    result.name = "Uniqueness".to_string();
    result
}

/// Items sharing both name and url.
pub fn find_by_name_url(items: &Items, tags: &TaggedFields) -> RuleResult {
    let (Some(name), Some(url)) = (
        first_field(tags, Tag::NameField),
        first_field(tags, Tag::ProductUrlField),
    ) else {
        return skipped("Duplicated Items", items);
    };
    let mut result = find_by(items, &[name, url]);
    result.name = "Duplicated Items".to_string();
    result
}

fn skipped(name: &str, items: &Items) -> RuleResult {
    let mut result = RuleResult::new(name).with_items_count(items.len());
    result.add_info(Outcome::Skipped);
    result
}

type Clusters = BTreeMap<Vec<Option<String>>, Vec<usize>>;

/// Row indices grouped by value tuple, only groups with several rows.
/// `None` when a column is absent.
fn duplicate_clusters(items: &Items, columns: &[String]) -> Option<Clusters> {
    let cells = columns
        .iter()
        .map(|column| items.column_texts(column).ok())
        .collect::<Option<Vec<_>>>()?;

    let mut groups = Clusters::new();
    for row in 0..items.len() {
        let values: Vec<Option<String>> = cells.iter().map(|column| column[row].clone()).collect();
        if values.iter().all(Option::is_none) {
            continue;
        }
        groups.entry(values).or_default().push(row);
    }
    groups.retain(|_, rows| rows.len() > 1);
    Some(groups)
}
