//! Schema tags that attach roles to item fields.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Unique,
    Category,
    NameField,
    ProductUrlField,
    ProductPriceField,
    ProductPriceWasField,
}

impl Tag {
    pub const ALL: [Tag; 6] = [
        Tag::Unique,
        Tag::Category,
        Tag::NameField,
        Tag::ProductUrlField,
        Tag::ProductPriceField,
        Tag::ProductPriceWasField,
    ];

    /// Old spellings still accepted in schemas.
    pub const DEPRECATED: [(&'static str, Tag); 1] = [("category_field", Tag::Category)];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Unique => "unique",
            Tag::Category => "category",
            Tag::NameField => "name_field",
            Tag::ProductUrlField => "product_url_field",
            Tag::ProductPriceField => "product_price_field",
            Tag::ProductPriceWasField => "product_price_was_field",
        }
    }

    /// Comma separated list of valid tag names.
    pub fn vocabulary() -> String {
        Tag::ALL
            .iter()
            .map(Tag::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn deprecated_alias(name: &str) -> Option<Tag> {
        Tag::DEPRECATED
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, tag)| *tag)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| ModelError::UnknownTag {
                tag: s.to_string(),
                expected: Tag::vocabulary(),
            })
    }
}

/// Tag to the fields carrying it, in schema order.
pub type TaggedFields = BTreeMap<Tag, Vec<String>>;

/// First field carrying `tag`.
pub fn first_field(tags: &TaggedFields, tag: Tag) -> Option<&str> {
    tags.get(&tag)
        .and_then(|fields| fields.first())
        .map(String::as_str)
}

/// Fields carrying `tag`, empty when the tag is absent.
pub fn fields_for(tags: &TaggedFields, tag: Tag) -> &[String] {
    tags.get(&tag).map(Vec::as_slice).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_parse_by_name() {
        for tag in Tag::ALL {
            assert_eq!(tag.as_str().parse::<Tag>().expect("parse tag"), tag);
        }
    }

    #[test]
    fn unknown_tag_lists_vocabulary() {
        let err = "colour".parse::<Tag>().unwrap_err();
        let text = err.to_string();
        assert!(text.contains("colour"));
        assert!(text.contains("product_price_was_field"));
    }

    #[test]
    fn alias_is_not_parsed_directly() {
        assert!("category_field".parse::<Tag>().is_err());
        assert_eq!(Tag::deprecated_alias("category_field"), Some(Tag::Category));
    }

    #[test]
    fn first_field_uses_schema_order() {
        let tags = TaggedFields::from([(
            Tag::NameField,
            vec!["title".to_string(), "name".to_string()],
        )]);
        assert_eq!(first_field(&tags, Tag::NameField), Some("title"));
        assert_eq!(first_field(&tags, Tag::Unique), None);
        assert!(fields_for(&tags, Tag::Unique).is_empty());
    }
}
