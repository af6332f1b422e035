//! Unwanted symbols in text fields.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use crawlqa_model::{ErrorKeys, Items, Message, RuleResult};
use regex::Regex;
use tracing::warn;

use crate::helpers::{percent, quoted_list};

const GROUPS: [&str; 4] = ["spaces", "html_entities", "css", "html_tags"];
const SAMPLE_LEN: usize = 20;

static GARBAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)(?P<spaces>^\s|\s$)",
        r"|(?P<html_entities>&[a-zA-Z]{2,}?;|&#\d*?;|&amp|&reg)",
        r"|(?P<css>[.#@][^\d{}#.\s][^{}#.]+?\{(?:[^:;{}]+?:[^:;{}]+?;)+?\s*?\})",
        r"|(?P<html_tags></??(?:h\d|b|u|i|div|ul|ol|li|table|tbody|th|tr|td|p|a|br|img|sup|blockquote)\s*?/??>|<!--|-->)",
    ))
    .expect("Invalid garbage symbols regex")
});

#[derive(Default)]
struct FieldGarbage {
    rows: BTreeSet<usize>,
    texts: BTreeSet<String>,
}

/// Finds leading or trailing spaces, HTML entities, CSS and HTML tags in
/// every text field. Expanded columns are reported under their origin field.
pub fn garbage_symbols(items: &Items) -> RuleResult {
    let mut result = RuleResult::new("Garbage Symbols").with_items_count(items.len());
    if items.is_empty() {
        return result;
    }

    let columns = match items.flat_text_columns() {
        Ok(columns) => columns,
        Err(err) => {
            warn!(%err, "text columns could not be read");
            return result;
        }
    };

    let mut fields: BTreeMap<String, FieldGarbage> = BTreeMap::new();
    for (column, cells) in &columns {
        for (row, cell) in cells.iter().enumerate() {
            let Some(text) = cell else {
                continue;
            };
            let found = matched_texts(text);
            if found.is_empty() {
                continue;
            }
            let field = fields
                .entry(items.origin_column(column).to_string())
                .or_default();
            field.rows.insert(row);
            field.texts.extend(found);
        }
    }

    if fields.is_empty() {
        return result;
    }

    let mut errors = ErrorKeys::new();
    let mut affected = BTreeSet::new();
    for (field, garbage) in &fields {
        let samples: BTreeSet<String> = garbage
            .texts
            .iter()
            .map(|text| text.escape_debug().take(SAMPLE_LEN).collect())
            .collect();
        let samples: Vec<String> = samples.into_iter().collect();
        let cause = format!(
            "{:.1}% of '{field}' values contain [{}]",
            percent(garbage.rows.len(), items.len()),
            quoted_list(&samples)
        );
        errors.insert(
            cause,
            garbage
                .rows
                .iter()
                .map(|row| items.keys()[*row].clone())
                .collect(),
        );
        affected.extend(garbage.rows.iter().copied());
    }

    result.add_error(
        Message::new(format!(
            "{:.1}% ({}) items affected",
            percent(affected.len(), items.len()),
            affected.len()
        ))
        .with_errors(errors),
    );
    result
}

/// Every garbage fragment found in `text`.
fn matched_texts(text: &str) -> Vec<String> {
    GARBAGE
        .captures_iter(text)
        .filter_map(|captures| {
            GROUPS
                .iter()
                .find_map(|group| captures.name(group))
                .map(|found| found.as_str().to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn items(rows: Value) -> Items {
        let Value::Array(rows) = rows else {
            panic!("rows must be an array");
        };
        Items::from_rows("memory", rows, true).expect("items")
    }

    #[test]
    fn each_pattern_is_detected() {
        assert_eq!(matched_texts(" leading"), [" "]);
        assert_eq!(matched_texts("Tom &amp; Jerry"), ["&amp;"]);
        assert_eq!(matched_texts("&#39;quoted"), ["&#39;"]);
        assert_eq!(matched_texts("<br/>text<B>"), ["<br/>", "<B>"]);
        assert_eq!(matched_texts("<!-- note"), ["<!--"]);
        assert_eq!(
            matched_texts(".price{color:red;}"),
            [".price{color:red;}"]
        );
        assert!(matched_texts("plain text").is_empty());
    }

    #[test]
    fn affected_rows_are_grouped_per_field() {
        let items = items(json!([
            {"name": "<b>bold</b>", "desc": "ok"},
            {"name": "fine", "desc": "trailing\n"},
            {"name": "fine", "desc": "ok"},
            {"name": "also fine", "desc": "ok"}
        ]));
        let result = garbage_symbols(&items);

        assert_eq!(result.err_items_count(), 2);
        assert_eq!(result.errors()[0].summary, "50.0% (2) items affected");
        let errors = result.errors()[0].errors.as_ref().expect("errors");
        assert!(errors.contains_key("25.0% of 'desc' values contain ['\\n']"));
        assert!(errors.contains_key("25.0% of 'name' values contain ['</b>', '<b>']"));
    }

    #[test]
    fn nested_fields_report_origin() {
        let items = items(json!([
            {"features": ["a", " b"]},
            {"features": ["c"]}
        ]));
        let result = garbage_symbols(&items);
        let errors = result.errors()[0].errors.as_ref().expect("errors");
        let cause = errors.keys().next().expect("cause");
        assert!(cause.contains("'features'"), "{cause}");
        assert_eq!(result.err_items_count(), 1);
    }

    #[test]
    fn clean_items_pass() {
        let items = items(json!([{"name": "a", "price": 10}]));
        let result = garbage_symbols(&items);
        assert!(result.messages.is_empty());
        assert_eq!(result.items_count, 1);
    }

    #[test]
    fn samples_are_debug_escaped() {
        let items = items(json!([{"style": ".ab{content:\"x\";}"}]));
        let result = garbage_symbols(&items);
        let errors = result.errors()[0].errors.as_ref().expect("errors");
        let cause = errors.keys().next().expect("cause");
        assert!(cause.ends_with(r#"['.ab{content:\"x\";}']"#), "{cause}");
    }

    #[test]
    fn samples_are_truncated() {
        let css = ".product-card-title{font-weight:bold;}";
        let items = items(json!([{"style": css}]));
        let result = garbage_symbols(&items);
        let errors = result.errors()[0].errors.as_ref().expect("errors");
        let cause = errors.keys().next().expect("cause");
        assert!(cause.ends_with("['.product-card-title{']"), "{cause}");
    }
}
