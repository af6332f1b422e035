use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("item #{index} is not a JSON object")]
    NotAnObject { index: usize },
    #[error("duplicate item key '{key}'")]
    DuplicateKey { key: String },
    #[error("column '{column}' not found in items")]
    ColumnNotFound { column: String },
    #[error("unknown tag '{tag}', expected one of: {expected}")]
    UnknownTag { tag: String, expected: String },
    #[error("polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

pub type Result<T> = std::result::Result<T, ModelError>;
