//! JSON schema validation and schema tag checks.

use std::collections::BTreeSet;

use crawlqa_model::{ErrorKeys, Items, KEY_FIELD, Message, RuleResult, TYPE_FIELD, Tag, TaggedFields};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, RuleError};
use crate::helpers::quoted_list;

/// Final error of [`check_tags`] when a tagged field is missing. Rules that
/// depend on tags are not run after it.
pub const SKIPPING_TAG_RULES: &str = "Skipping tag rules";

/// Phrases that are kept verbatim after the failing property path.
const PATH_MESSAGES: [&str; 8] = [
    "is not of type",
    "does not match",
    "is not one of",
    "is not a",
    "is greater than the maximum of",
    "is less than the minimum of",
    "is too long",
    "is too short",
];

/// One segment of an instance path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathItem {
    Key(String),
    Index(usize),
}

/// Splits a JSON pointer into segments, unescaping `~1` and `~0`.
/// All-digit segments become [`PathItem::Index`].
pub fn parse_pointer(pointer: &str) -> Vec<PathItem> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| {
            let segment = segment.replace("~1", "/").replace("~0", "~");
            match segment.parse::<usize>() {
                Ok(index) if segment.bytes().all(|b| b.is_ascii_digit()) => PathItem::Index(index),
                _ => PathItem::Key(segment),
            }
        })
        .collect()
}

fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Rewrites a validator message into a short, groupable form.
pub fn format_validation_message(
    message: &str,
    path: &[PathItem],
    schema_path: &[String],
    keyword: &str,
) -> String {
    let path = path
        .iter()
        .filter_map(|item| match item {
            PathItem::Key(key) => Some(key.as_str()),
            PathItem::Index(_) => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    let schema_path = schema_path.join("/");

    if keyword == "anyOf" {
        return if path.is_empty() {
            format!("'schema/{schema_path}' failed")
        } else {
            format!("'{path}' does not satisfy 'schema/{schema_path}'")
        };
    }

    if message.contains("Additional properties are not allowed") {
        return match message.find(" (") {
            Some(end) => message[..end].to_string(),
            None => message.to_string(),
        };
    }

    if path.is_empty() {
        return message.to_string();
    }

    PATH_MESSAGES
        .iter()
        .find_map(|phrase| message.find(phrase))
        .map(|start| format!("{path} {}", &message[start..]))
        .unwrap_or_else(|| format!("{path} - {message}"))
}

/// Validates every item against `schema`.
///
/// Full mode collects every violation of an item, fast mode only the first.
pub fn validate(schema: &Value, items: &Items, fast: bool) -> Result<RuleResult> {
    let validator = jsonschema::options()
        .should_validate_formats(true)
        .build(schema)
        .map_err(|err| RuleError::InvalidSchema {
            message: err.to_string(),
        })?;

    let mut errors = ErrorKeys::new();
    for (row, key) in items.raw().iter().zip(items.keys()) {
        let mut document = row.clone();
        document.remove(KEY_FIELD);
        document.remove(TYPE_FIELD);
        let document = Value::Object(document);

        let violations = validator.iter_errors(&document);
        let limit = if fast { 1 } else { usize::MAX };
        for err in violations.take(limit) {
            let schema_path = pointer_segments(&err.schema_path().to_string());
            let keyword = schema_path.last().cloned().unwrap_or_default();
            let formatted = format_validation_message(
                &err.to_string(),
                &parse_pointer(&err.instance_path().to_string()),
                &schema_path,
                &keyword,
            );
            errors.entry(formatted).or_default().insert(key.clone());
        }
    }
    debug!(
        items = items.len(),
        messages = errors.len(),
        fast,
        "schema validation finished"
    );

    let mut result = RuleResult::new("JSON Schema Validation").with_items_count(items.len());
    let summary = format!("{} items were checked, {} error(s)", items.len(), errors.len());
    if errors.is_empty() {
        result.add_info(summary);
    } else {
        result.add_error(Message::new(summary).with_errors(errors));
    }
    Ok(result)
}

/// Reports used tags and tagged fields missing from the source or target.
pub fn check_tags(
    source_columns: &[String],
    target_columns: Option<&[String]>,
    tags: &TaggedFields,
) -> RuleResult {
    let mut result = RuleResult::new("Tags");

    let mut used: Vec<&str> = tags.keys().map(Tag::as_str).collect();
    used.sort_unstable();
    if !used.is_empty() {
        result.add_info(format!("Used - {}", used.join(", ")));
    }
    let mut unused: Vec<&str> = Tag::ALL
        .iter()
        .filter(|tag| !tags.contains_key(*tag))
        .map(Tag::as_str)
        .collect();
    unused.sort_unstable();
    if !unused.is_empty() {
        result.add_info(format!("Not used - {}", unused.join(", ")));
    }

    let tagged: BTreeSet<&String> = tags.values().flatten().collect();
    let mut report_missing = |columns: &[String], side: &str| {
        let missing: Vec<&String> = tagged
            .iter()
            .copied()
            .filter(|field| !columns.contains(field))
            .collect();
        if !missing.is_empty() {
            result.add_error(format!(
                "{} field(s) was not found in {side}, but specified in schema",
                quoted_list(&missing)
            ));
        }
    };
    report_missing(source_columns, "source");
    if let Some(target_columns) = target_columns {
        report_missing(target_columns, "target");
    }

    if result.has_errors() {
        result.add_error(SKIPPING_TAG_RULES);
    }
    result
}

/// Whether a tags result asks for tag rules to be skipped.
pub fn skips_tag_rules(result: &RuleResult) -> bool {
    result
        .errors()
        .iter()
        .any(|message| message.summary == SKIPPING_TAG_RULES)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn key(name: &str) -> PathItem {
        PathItem::Key(name.to_string())
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn pointers_split_into_keys_and_indexes() {
        assert_eq!(
            parse_pointer("/options/0/a~1b/~0c"),
            [key("options"), PathItem::Index(0), key("a/b"), key("~c")]
        );
        assert!(parse_pointer("").is_empty());
    }

    #[test]
    fn type_errors_keep_only_named_path_segments() {
        let path = [
            key("root_field"),
            PathItem::Index(0),
            key("deep"),
            key("deeper"),
            PathItem::Index(100),
        ];
        assert_eq!(
            format_validation_message("is not of type 'string'", &path, &[], "type"),
            "root_field/deep/deeper is not of type 'string'"
        );
    }

    #[test]
    fn any_of_reports_schema_location() {
        assert_eq!(
            format_validation_message("a very long error message", &[], &strings(&["anyOf"]), "anyOf"),
            "'schema/anyOf' failed"
        );
        assert_eq!(
            format_validation_message(
                "a very very long error message",
                &[key("options"), PathItem::Index(0)],
                &strings(&["properties", "options", "items", "anyOf"]),
                "anyOf"
            ),
            "'options' does not satisfy 'schema/properties/options/items/anyOf'"
        );
    }

    #[test]
    fn rootless_and_additional_property_messages() {
        assert_eq!(
            format_validation_message(
                "Additional properties are not allowed ('delivery_options')",
                &[],
                &[],
                "additionalProperties"
            ),
            "Additional properties are not allowed"
        );
        assert_eq!(
            format_validation_message("'biography' is a required property", &[], &[], "required"),
            "'biography' is a required property"
        );
        assert_eq!(
            format_validation_message("https://sto' is not a 'date-time'", &[key("url")], &[], "format"),
            "url is not a 'date-time'"
        );
        assert_eq!(
            format_validation_message("other error", &[key("field")], &[], ""),
            "field - other error"
        );
    }

    #[test]
    fn items_are_grouped_by_message() {
        let schema = json!({"properties": {"NAME": {"type": "string"}}});
        let items = Items::from_rows(
            "memory",
            vec![
                json!({"NAME": null, "_key": "0"}),
                json!({"NAME": 3, "_key": "1"}),
                json!({"NAME": "ok", "_key": "2"}),
            ],
            false,
        )
        .expect("items");
        let result = validate(&schema, &items, false).expect("valid schema");

        assert_eq!(result.errors()[0].summary, "3 items were checked, 2 error(s)");
        assert_eq!(
            result.err_keys(),
            BTreeSet::from(["0".to_string(), "1".to_string()])
        );
        let errors = result.errors()[0].errors.as_ref().expect("errors");
        assert!(errors.keys().all(|message| message.starts_with("NAME is not of type")));
    }

    #[test]
    fn fast_mode_takes_one_error_per_item() {
        let schema = json!({
            "properties": {"a": {"type": "string"}, "b": {"type": "string"}}
        });
        let items =
            Items::from_rows("memory", vec![json!({"a": 1, "b": 2})], false).expect("items");
        let full = validate(&schema, &items, false).expect("full");
        let fast = validate(&schema, &items, true).expect("fast");
        assert_eq!(full.errors()[0].summary, "1 items were checked, 2 error(s)");
        assert_eq!(fast.errors()[0].summary, "1 items were checked, 1 error(s)");
    }

    #[test]
    fn bookkeeping_fields_are_not_validated() {
        let schema = json!({"additionalProperties": false, "properties": {"a": {}}});
        let items = Items::from_rows(
            "memory",
            vec![json!({"a": 1, "_key": "k", "_type": "Item"})],
            false,
        )
        .expect("items");
        let result = validate(&schema, &items, false).expect("valid schema");
        assert_eq!(result.info()[0].summary, "1 items were checked, 0 error(s)");
    }

    #[test]
    fn broken_schema_is_an_error() {
        let items = Items::from_rows("memory", vec![json!({"a": 1})], false).expect("items");
        let err = validate(&json!({"type": 5}), &items, false).unwrap_err();
        assert!(matches!(err, RuleError::InvalidSchema { .. }));
    }

    #[test]
    fn tags_report_usage_and_missing_fields() {
        let tags = TaggedFields::from([
            (Tag::Unique, vec!["id".to_string()]),
            (Tag::NameField, vec!["name".to_string()]),
        ]);
        let columns = strings(&["id", "name"]);
        let result = check_tags(&columns, None, &tags);

        assert_eq!(result.info()[0].summary, "Used - name_field, unique");
        assert_eq!(
            result.info()[1].summary,
            "Not used - category, product_price_field, product_price_was_field, product_url_field"
        );
        assert!(!result.has_errors());
        assert!(!skips_tag_rules(&result));
    }

    #[test]
    fn missing_tagged_fields_skip_tag_rules() {
        let tags = TaggedFields::from([(Tag::Unique, vec!["id".to_string()])]);
        let columns = strings(&["key"]);
        let result = check_tags(&columns, Some(columns.as_slice()), &tags);

        let errors: Vec<&str> = result.errors().iter().map(|m| m.summary.as_str()).collect();
        assert_eq!(
            errors,
            [
                "'id' field(s) was not found in source, but specified in schema",
                "'id' field(s) was not found in target, but specified in schema",
                SKIPPING_TAG_RULES,
            ]
        );
        assert!(skips_tag_rules(&result));
    }
}
