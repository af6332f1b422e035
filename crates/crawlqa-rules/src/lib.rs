//! Data-quality rules for scraped items and crawl jobs.
//!
//! Every rule is a plain function returning a [`RuleResult`]. Findings are
//! messages, never errors; a rule that cannot run reports `SKIPPED`.
//! Both `coverage` and `category` export a `get_difference`, so those two are
//! reached through their modules.

pub mod boolean;
pub mod category;
pub mod coverage;
pub mod duplicates;
pub mod error;
pub mod garbage;
pub mod helpers;
pub mod json_schema;
pub mod metadata;
pub mod price;

pub use boolean::compare_boolean_fields;
pub use category::{DEFAULT_MAX_UNIQUES, get_categories, get_coverage_per_category};
pub use coverage::{check_fields_coverage, compare_scraped_fields};
pub use duplicates::{find_by, find_by_groups, find_by_name_url, find_by_unique};
pub use error::{Result, RuleError};
pub use garbage::garbage_symbols;
pub use json_schema::{
    PathItem, SKIPPING_TAG_RULES, check_tags, format_validation_message, parse_pointer,
    skips_tag_rules, validate,
};
pub use metadata::{
    check_errors, check_outcome, check_response_ratio, compare_errors, compare_finish_time,
    compare_number_of_scraped_items, compare_response_ratio, compare_runtime,
    compare_spider_names,
};
pub use price::{
    PRICE_TOLERANCE, compare_names_for_same_urls, compare_prices_for_same_names,
    compare_prices_for_same_urls, compare_was_now,
};

#[doc(no_inline)]
pub use crawlqa_model::RuleResult;
