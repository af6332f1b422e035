//! Price and name consistency rules.
//!
//! `compare_was_now` checks a single table. The `compare_*_for_same_*` rules
//! join two tables on the url or name field and compare the paired rows.
//! Only the first row for each join value takes part in a comparison.

use std::collections::{BTreeSet, HashMap};

use crawlqa_model::{
    ErrorKeys, Items, Message, Outcome, RuleResult, Tag, TaggedFields, first_field,
    polars_utils::parse_f64,
};

use crate::helpers::{MISSING, percent, relative_difference};

/// Relative price difference above which two prices disagree.
pub const PRICE_TOLERANCE: f64 = 0.10;

/// Flags rows whose previous price is below or equal to the current one.
pub fn compare_was_now(items: &Items, tags: &TaggedFields) -> RuleResult {
    let mut result = RuleResult::new("Compare Price Was And Now").with_items_count(items.len());

    let columns = first_field(tags, Tag::ProductPriceWasField)
        .zip(first_field(tags, Tag::ProductPriceField))
        .filter(|(was, now)| items.has_column(was) && items.has_column(now));
    let Some((was_field, now_field)) = columns else {
        result.add_info(Outcome::Skipped);
        return result;
    };
    let (Ok(was), Ok(now)) = (
        items.column_numbers(was_field),
        items.column_numbers(now_field),
    ) else {
        result.add_info(Outcome::Skipped);
        return result;
    };

    let mut less = BTreeSet::new();
    let mut equal = BTreeSet::new();
    for (row, pair) in was.iter().zip(&now).enumerate() {
        let (Some(was), Some(now)) = pair else {
            continue;
        };
        let key = items.keys()[row].clone();
        if was < now {
            less.insert(key);
        } else if was == now {
            equal.insert(key);
        }
    }

    if !less.is_empty() {
        let count = less.len();
        result.add_error(
            Message::new(format!(
                "{:.2}% ({count}) of items with {was_field} < {now_field}",
                percent(count, items.len())
            ))
            .with_errors(ErrorKeys::from([(
                format!("Past price is less than current for {count} items"),
                less,
            )])),
        );
    }
    if !equal.is_empty() {
        let count = equal.len();
        result.add_warning(
            Message::new(format!(
                "{:.2}% ({count}) of items with {was_field} = {now_field}",
                percent(count, items.len())
            ))
            .with_errors(ErrorKeys::from([(
                format!("Prices equal for {count} items"),
                equal,
            )])),
        );
    }
    result
}

/// Rows of one table indexed by a join column.
struct Joined {
    values: Vec<String>,
    first_row: HashMap<String, usize>,
}

impl Joined {
    fn new(items: &Items, column: &str) -> Option<Self> {
        let cells = items.column_texts(column).ok()?;
        let mut values = Vec::new();
        let mut first_row = HashMap::new();
        for (row, cell) in cells.into_iter().enumerate() {
            let Some(value) = cell else {
                continue;
            };
            if !first_row.contains_key(&value) {
                first_row.insert(value.clone(), row);
                values.push(value);
            }
        }
        Some(Self { values, first_row })
    }

    fn contains(&self, value: &str) -> bool {
        self.first_row.contains_key(value)
    }

    fn row(&self, value: &str) -> Option<usize> {
        self.first_row.get(value).copied()
    }

    fn only_in<'a>(&'a self, other: &Joined) -> Vec<&'a String> {
        self.values.iter().filter(|value| !other.contains(value)).collect()
    }
}

struct Comparison<'a> {
    source: &'a Items,
    target: &'a Items,
    source_rows: Joined,
    target_rows: Joined,
}

impl<'a> Comparison<'a> {
    fn new(source: &'a Items, target: &'a Items, column: &str) -> Option<Self> {
        Some(Self {
            source,
            target,
            source_rows: Joined::new(source, column)?,
            target_rows: Joined::new(target, column)?,
        })
    }

    fn same(&self) -> Vec<&String> {
        self.source_rows
            .values
            .iter()
            .filter(|value| self.target_rows.contains(value))
            .collect()
    }

    fn missing(&self) -> Vec<&String> {
        self.target_rows.only_in(&self.source_rows)
    }

    fn new_values(&self) -> Vec<&String> {
        self.source_rows.only_in(&self.target_rows)
    }

    /// First source and target rows for a value present in both tables.
    fn pair(&self, value: &str) -> Option<(usize, usize)> {
        Some((self.source_rows.row(value)?, self.target_rows.row(value)?))
    }

    fn source_key(&self, row: usize) -> &str {
        &self.source.keys()[row]
    }

    fn target_key(&self, row: usize) -> &str {
        &self.target.keys()[row]
    }

    fn report_counts(&self, result: &mut RuleResult, noun: &str, url_column: Option<&str>) {
        let target_urls = url_column.and_then(|column| self.target.column_texts(column).ok());
        let missing = self.missing();
        let detailed = missing
            .iter()
            .filter_map(|value| {
                let row = self.target_rows.row(value)?;
                let line = format!("Missing {value} from {}", self.target_key(row));
                Some(match target_urls.as_ref().and_then(|urls| urls[row].as_ref()) {
                    Some(url) => format!("{line}\n{url}"),
                    None => line,
                })
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut message = Message::new(format!(
            "{} {noun} missing from the tested job",
            missing.len()
        ));
        if !detailed.is_empty() {
            message = message.with_detailed(detailed);
        }
        result.add_info(message);
        result.add_info(format!(
            "{} new {noun} in the tested job",
            self.new_values().len()
        ));
        result.add_info(format!("{} same {noun} in both jobs", self.same().len()));
    }
}

/// Pairs that disagree, collected as detailed lines and source keys.
/// `checked` counts only pairs where both sides could be compared.
#[derive(Default)]
struct Mismatches {
    checked: usize,
    lines: Vec<String>,
    keys: BTreeSet<String>,
}

impl Mismatches {
    fn report(self, result: &mut RuleResult, cause: &str) {
        let summary = format!("{} checked, {} errors", self.checked, self.lines.len());
        if self.lines.is_empty() {
            result.add_info(summary);
        } else {
            result.add_error(
                Message::new(summary)
                    .with_detailed(self.lines.join("\n"))
                    .with_errors(ErrorKeys::from([(cause.to_string(), self.keys)])),
            );
        }
    }
}

fn is_placeholder(value: &str) -> bool {
    value.trim() == MISSING
}

fn not_set(result: &mut RuleResult, tag: Tag) {
    result.add_info(format!("{tag} tag is not set"));
}

/// Numbers from a cell text; text that is not a number is `None`.
fn price_at(cells: &[Option<String>], row: usize) -> Option<f64> {
    cells[row].as_deref().and_then(parse_f64)
}

/// Compares prices of items sharing a url.
pub fn compare_prices_for_same_urls(
    source: &Items,
    target: &Items,
    tags: &TaggedFields,
) -> RuleResult {
    let mut result = RuleResult::new("Compare Prices For Same Urls").with_items_count(source.len());
    let Some(url_field) = first_field(tags, Tag::ProductUrlField) else {
        not_set(&mut result, Tag::ProductUrlField);
        return result;
    };
    let Some(comparison) = Comparison::new(source, target, url_field) else {
        result.add_info(Outcome::Skipped);
        return result;
    };
    comparison.report_counts(&mut result, "urls", None);

    let Some(price_field) = first_field(tags, Tag::ProductPriceField) else {
        not_set(&mut result, Tag::ProductPriceField);
        return result;
    };
    let (Ok(source_prices), Ok(target_prices)) = (
        source.column_texts(price_field),
        target.column_texts(price_field),
    ) else {
        result.add_info(Outcome::Skipped);
        return result;
    };

    let same = comparison.same();
    let mut mismatches = Mismatches::default();
    for url in same.iter().filter(|url| !is_placeholder(url)) {
        let Some((source_row, target_row)) = comparison.pair(url) else {
            continue;
        };
        let (Some(source_price), Some(target_price)) = (
            price_at(&source_prices, source_row),
            price_at(&target_prices, target_row),
        ) else {
            continue;
        };
        mismatches.checked += 1;
        if relative_difference(source_price, target_price) > PRICE_TOLERANCE {
            mismatches.lines.push(format!(
                "different prices for url: {url}\nsource price is {} for {}\ntarget price is {} for {}",
                source_prices[source_row].as_deref().unwrap_or(MISSING),
                comparison.source_key(source_row),
                target_prices[target_row].as_deref().unwrap_or(MISSING),
                comparison.target_key(target_row),
            ));
            mismatches.keys.insert(comparison.source_key(source_row).to_string());
        }
    }
    mismatches.report(&mut result, "Prices differ for the same url");
    result
}

/// Compares names of items sharing a url.
pub fn compare_names_for_same_urls(
    source: &Items,
    target: &Items,
    tags: &TaggedFields,
) -> RuleResult {
    let mut result = RuleResult::new("Compare Names Per Url").with_items_count(source.len());
    let Some(url_field) = first_field(tags, Tag::ProductUrlField) else {
        not_set(&mut result, Tag::ProductUrlField);
        return result;
    };
    let Some(name_field) = first_field(tags, Tag::NameField) else {
        not_set(&mut result, Tag::NameField);
        return result;
    };
    let (Some(comparison), Ok(source_names), Ok(target_names)) = (
        Comparison::new(source, target, url_field),
        source.column_texts(name_field),
        target.column_texts(name_field),
    ) else {
        result.add_info(Outcome::Skipped);
        return result;
    };

    let same = comparison.same();
    let mut mismatches = Mismatches::default();
    for url in same.iter().filter(|url| !is_placeholder(url)) {
        let Some((source_row, target_row)) = comparison.pair(url) else {
            continue;
        };
        let (Some(source_name), Some(target_name)) =
            (&source_names[source_row], &target_names[target_row])
        else {
            continue;
        };
        let comparable = |name: &str| !name.trim().is_empty() && !is_placeholder(name);
        if !comparable(source_name) || !comparable(target_name) {
            continue;
        }
        mismatches.checked += 1;
        if source_name != target_name {
            mismatches.lines.push(format!(
                "different names for url: {url}\nsource name is {source_name} for {}\ntarget name is {target_name} for {}",
                comparison.source_key(source_row),
                comparison.target_key(target_row),
            ));
            mismatches.keys.insert(comparison.source_key(source_row).to_string());
        }
    }
    mismatches.report(&mut result, "Names differ for the same url");
    result
}

/// Compares prices of items sharing a name.
pub fn compare_prices_for_same_names(
    source: &Items,
    target: &Items,
    tags: &TaggedFields,
) -> RuleResult {
    let mut result = RuleResult::new("Compare Prices For Same Names").with_items_count(source.len());
    let Some(name_field) = first_field(tags, Tag::NameField) else {
        not_set(&mut result, Tag::NameField);
        return result;
    };
    let url_field = first_field(tags, Tag::ProductUrlField);
    if url_field.is_none() {
        not_set(&mut result, Tag::ProductUrlField);
    }
    let Some(comparison) = Comparison::new(source, target, name_field) else {
        result.add_info(Outcome::Skipped);
        return result;
    };
    comparison.report_counts(&mut result, "names", url_field);

    let Some(price_field) = first_field(tags, Tag::ProductPriceField) else {
        not_set(&mut result, Tag::ProductPriceField);
        return result;
    };
    let (Ok(source_prices), Ok(target_prices)) = (
        source.column_texts(price_field),
        target.column_texts(price_field),
    ) else {
        result.add_info(Outcome::Skipped);
        return result;
    };

    let same = comparison.same();
    let mut mismatches = Mismatches::default();
    for name in same.iter().filter(|name| !is_placeholder(name)) {
        let Some((source_row, target_row)) = comparison.pair(name) else {
            continue;
        };
        let (Some(source_price), Some(target_price)) = (
            price_at(&source_prices, source_row),
            price_at(&target_prices, target_row),
        ) else {
            continue;
        };
        mismatches.checked += 1;
        if relative_difference(source_price, target_price) > PRICE_TOLERANCE {
            mismatches.lines.push(format!(
                "different price for {name}\nsource price is {} for {}\ntarget price is {} for {}",
                source_prices[source_row].as_deref().unwrap_or(MISSING),
                comparison.source_key(source_row),
                target_prices[target_row].as_deref().unwrap_or(MISSING),
                comparison.target_key(target_row),
            ));
            mismatches.keys.insert(comparison.source_key(source_row).to_string());
        }
    }
    mismatches.report(&mut result, "Prices differ for the same name");
    result
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn items(key: &str, rows: Value) -> Items {
        let Value::Array(rows) = rows else {
            panic!("rows must be an array");
        };
        Items::from_rows(key, rows, false).expect("items")
    }

    fn price_tags() -> TaggedFields {
        TaggedFields::from([
            (Tag::ProductPriceWasField, vec!["was".to_string()]),
            (Tag::ProductPriceField, vec!["now".to_string()]),
            (Tag::ProductUrlField, vec!["url".to_string()]),
            (Tag::NameField, vec!["name".to_string()]),
        ])
    }

    #[test]
    fn was_less_than_now_is_an_error_and_equal_a_warning() {
        let items = items("s", json!([{"was": 10, "now": 20}, {"was": 15, "now": 15}]));
        let result = compare_was_now(&items, &price_tags());

        assert_eq!(result.items_count, 2);
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].summary, "50.00% (1) of items with was < now");
        assert_eq!(result.warnings()[0].summary, "50.00% (1) of items with was = now");
        assert_eq!(result.err_keys(), BTreeSet::from(["0".to_string()]));
        assert_eq!(
            result.keys_at(crawlqa_model::Level::Warning),
            BTreeSet::from(["1".to_string()])
        );
    }

    #[test]
    fn was_now_skips_without_tags_or_numbers() {
        let items = items("s", json!([{"was": "n/a", "now": 1}]));
        let result = compare_was_now(&items, &TaggedFields::new());
        assert!(result.is_skipped());

        let result = compare_was_now(&items, &price_tags());
        assert!(result.messages.is_empty());
    }

    #[test]
    fn prices_for_same_urls_use_ten_percent_tolerance() {
        let source = items(
            "s",
            json!([
                {"url": "a", "now": 100},
                {"url": "b", "now": 100},
                {"url": "c", "now": "free"},
                {"url": "new", "now": 1}
            ]),
        );
        let target = items(
            "t",
            json!([
                {"url": "a", "now": 90},
                {"url": "b", "now": 89},
                {"url": "c", "now": 10},
                {"url": "gone", "now": 1}
            ]),
        );
        let result = compare_prices_for_same_urls(&source, &target, &price_tags());

        let summaries: Vec<&str> = result.info().iter().map(|m| m.summary.as_str()).collect();
        assert_eq!(
            summaries,
            [
                "1 urls missing from the tested job",
                "1 new urls in the tested job",
                "3 same urls in both jobs"
            ]
        );
        assert_eq!(result.info()[0].detailed.as_deref(), Some("Missing gone from 3"));
        assert_eq!(result.errors()[0].summary, "2 checked, 1 errors");
        assert_eq!(result.err_keys(), BTreeSet::from(["1".to_string()]));
    }

    #[test]
    fn non_numeric_prices_are_not_counted_as_checked() {
        let source = items("s", json!([{"url": "a", "now": 100}, {"url": "c", "now": "free"}]));
        let target = items("t", json!([{"url": "a", "now": 50}, {"url": "c", "now": 10}]));
        let result = compare_prices_for_same_urls(&source, &target, &price_tags());
        assert_eq!(result.errors()[0].summary, "1 checked, 1 errors");

        let source = items("s", json!([{"url": "c", "now": "free"}]));
        let result = compare_prices_for_same_urls(&source, &target, &price_tags());
        assert!(result.errors().is_empty());
        assert_eq!(result.info().last().map(|m| m.summary.as_str()), Some("0 checked, 0 errors"));
    }

    #[test]
    fn missing_url_tag_is_reported() {
        let source = items("s", json!([{"url": "a"}]));
        let result = compare_prices_for_same_urls(&source, &source, &TaggedFields::new());
        assert_eq!(result.info()[0].summary, "product_url_field tag is not set");
    }

    #[test]
    fn names_for_same_urls_ignore_placeholders() {
        let source = items(
            "s",
            json!([
                {"url": "a", "name": "Book"},
                {"url": "b", "name": "nan"},
                {"url": "c", "name": "Pen"}
            ]),
        );
        let target = items(
            "t",
            json!([
                {"url": "a", "name": "Book"},
                {"url": "b", "name": "Other"},
                {"url": "c", "name": "Pencil"}
            ]),
        );
        let result = compare_names_for_same_urls(&source, &target, &price_tags());
        assert_eq!(result.errors()[0].summary, "2 checked, 1 errors");
        assert_eq!(
            result.errors()[0].detailed.as_deref(),
            Some("different names for url: c\nsource name is Pen for 2\ntarget name is Pencil for 2")
        );
    }

    #[test]
    fn prices_for_same_names_without_price_tag() {
        let source = items("s", json!([{"name": "a", "url": "u1"}]));
        let target = items("t", json!([{"name": "b", "url": "u2"}]));
        let tags = TaggedFields::from([
            (Tag::NameField, vec!["name".to_string()]),
            (Tag::ProductUrlField, vec!["url".to_string()]),
        ]);
        let result = compare_prices_for_same_names(&source, &target, &tags);
        assert_eq!(result.info()[0].detailed.as_deref(), Some("Missing b from 0\nu2"));
        assert_eq!(
            result.info().last().map(|m| m.summary.as_str()),
            Some("product_price_field tag is not set")
        );
    }
}
