//! Loading crawl data for quality checks.
//!
//! Items, JSON schemas and job metadata are read from local files and
//! turned into the types of `crawlqa-model`.

mod error;
mod items;
mod job;
mod schema;
mod source;

// === Error Types ===
pub use error::{IngestError, Result};

// === Items ===
pub use items::{ItemsFormat, load_items, read_rows};

// === Job Metadata ===
pub use job::{load_job_metadata, parse_job_metadata};

// === Schemas ===
pub use schema::{Schema, load_schema, tagged_fields};

// === Source Keys ===
pub use source::{CollectionKey, DataSource, JobKey};
