//! JSON schema loading and tag extraction.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crawlqa_model::{Tag, TaggedFields};
use serde_json::Value;
use tracing::warn;

use crate::error::{IngestError, Result};

/// A JSON schema together with the tags declared on its properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub raw: Value,
    pub tags: TaggedFields,
}

impl Schema {
    pub fn from_value(raw: Value) -> Result<Self> {
        let tags = tagged_fields(&raw)?;
        Ok(Self { raw, tags })
    }

    /// Property names in schema order.
    pub fn properties(&self) -> Vec<String> {
        self.raw
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| properties.keys().cloned().collect())
            .unwrap_or_default()
    }
}

pub fn load_schema(path: &Path) -> Result<Schema> {
    let text = fs::read_to_string(path).map_err(|source| IngestError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: Value = serde_json::from_str(&text).map_err(|source| IngestError::Json {
        path: path.to_path_buf(),
        line: source.line(),
        source,
    })?;
    if !raw.is_object() {
        return Err(IngestError::Format {
            path: path.to_path_buf(),
            reason: "a schema must be a JSON object".to_string(),
        });
    }
    Schema::from_value(raw)
}

/// Collects `tag` declarations from the schema's `properties`.
pub fn tagged_fields(schema: &Value) -> Result<TaggedFields> {
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .ok_or(IngestError::SchemaWithoutProperties)?;

    let mut tagged = TaggedFields::new();
    for (field, definition) in properties {
        let Some(declared) = definition.get("tag") else {
            continue;
        };
        for tag in field_tags(field, declared)? {
            tagged.entry(tag).or_default().push(field.clone());
        }
    }
    Ok(tagged)
}

fn field_tags(field: &str, declared: &Value) -> Result<BTreeSet<Tag>> {
    let invalid = || IngestError::InvalidTag {
        field: field.to_string(),
        value: declared.to_string(),
    };
    let names: Vec<&str> = match declared {
        Value::String(name) => vec![name.as_str()],
        Value::Array(values) => values
            .iter()
            .map(|value| value.as_str().ok_or_else(invalid))
            .collect::<Result<_>>()?,
        _ => return Err(invalid()),
    };

    let mut tags = BTreeSet::new();
    let mut unknown = BTreeSet::new();
    for name in names {
        if let Ok(tag) = name.parse::<Tag>() {
            tags.insert(tag);
        } else if let Some(tag) = Tag::deprecated_alias(name) {
            warn!(
                field,
                tag = name,
                replacement = %tag,
                "deprecated tag, use the replacement instead"
            );
            tags.insert(tag);
        } else {
            unknown.insert(format!("'{name}'"));
        }
    }

    if !unknown.is_empty() {
        return Err(IngestError::UnknownTags {
            tags: unknown.into_iter().collect::<Vec<_>>().join(", "),
            expected: Tag::vocabulary(),
        });
    }
    Ok(tags)
}
