//! Item file loading.
//!
//! Items come as JSON lines (`.jl`, `.jsonl`), a JSON array (`.json`) or a
//! CSV export (`.csv`). Every format ends up as JSON objects that are handed
//! to [`Items::from_rows`].

use std::fs;
use std::path::Path;

use crawlqa_model::Items;
use serde_json::{Map, Number, Value};
use tracing::{debug, info};

use crate::error::{IngestError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemsFormat {
    JsonLines,
    JsonArray,
    Csv,
}

impl ItemsFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("jl" | "jsonl") => Ok(Self::JsonLines),
            Some("json") => Ok(Self::JsonArray),
            Some("csv") => Ok(Self::Csv),
            _ => Err(IngestError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Loads items from `path`, labelling them with `key`.
pub fn load_items(path: &Path, key: &str, expand: bool) -> Result<Items> {
    let rows = read_rows(path)?;
    info!(path = %path.display(), rows = rows.len(), "loaded items");
    Ok(Items::from_rows(key, rows, expand)?)
}

/// Reads raw item objects from `path` according to its extension.
pub fn read_rows(path: &Path) -> Result<Vec<Value>> {
    let format = ItemsFormat::from_path(path)?;
    let text = fs::read_to_string(path).map_err(|source| IngestError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), ?format, "reading items");
    match format {
        ItemsFormat::JsonLines => parse_json_lines(path, &text),
        ItemsFormat::JsonArray => parse_json_array(path, &text),
        ItemsFormat::Csv => parse_csv(path, &text),
    }
}

fn parse_json_lines(path: &Path, text: &str) -> Result<Vec<Value>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| IngestError::Json {
                path: path.to_path_buf(),
                line: idx + 1,
                source,
            })
        })
        .collect()
}

fn parse_json_array(path: &Path, text: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(text).map_err(|source| IngestError::Json {
        path: path.to_path_buf(),
        line: source.line(),
        source,
    })?;
    match value {
        Value::Array(rows) => Ok(rows),
        _ => Err(IngestError::Format {
            path: path.to_path_buf(),
            reason: "expected a JSON array of items".to_string(),
        }),
    }
}

fn parse_csv(path: &Path, text: &str) -> Result<Vec<Value>> {
    let csv_error = |source| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers().map_err(csv_error)?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(name, cell)| (name.to_string(), csv_cell(cell)))
            .collect();
        rows.push(Value::Object(row));
    }
    Ok(rows)
}

/// Empty cells are missing; numbers and booleans keep their type.
fn csv_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = cell.parse::<i64>() {
        return Value::from(int);
    }
    if let Some(number) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    match cell {
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}
