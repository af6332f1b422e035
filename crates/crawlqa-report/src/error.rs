//! Errors raised while rendering reports.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write HTML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("failed to write HTML: {0}")]
    Io(#[from] io::Error),

    #[error("rendered HTML is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    Model(#[from] crawlqa_model::ModelError),

    #[error("failed to serialize schema: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("failed to write report to {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ReportError>;
