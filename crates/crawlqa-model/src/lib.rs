//! Core types shared by the crawl data-quality crates.

pub mod error;
pub mod items;
pub mod job;
pub mod polars_utils;
pub mod result;
pub mod tags;

pub use error::{ModelError, Result};
pub use items::{Items, KEY_FIELD, Row, TYPE_FIELD};
pub use job::{JobMetadata, round2};
pub use result::{ErrorKeys, Level, Message, Outcome, RuleResult, Stat, StatSeries, StatTable};
pub use tags::{Tag, TaggedFields, fields_for, first_field};
