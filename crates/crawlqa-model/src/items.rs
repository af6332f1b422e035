//! Tabular view over scraped items.
//!
//! Items arrive as JSON objects. They are kept verbatim for schema
//! validation and are also laid out as a polars [`DataFrame`] with one column
//! per top-level field. When expansion is enabled a second, flat frame breaks
//! objects and arrays down into `<field>_<key>` / `<field>_<index>` columns.

use std::collections::{BTreeMap, HashMap, HashSet};

use polars::prelude::*;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ModelError, Result};
use crate::polars_utils::{any_to_bool, any_to_f64, any_to_text};

/// Row identifier field, never a column.
pub const KEY_FIELD: &str = "_key";
/// Item type field, never a column.
pub const TYPE_FIELD: &str = "_type";

pub type Row = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct Items {
    key: String,
    df: DataFrame,
    flat_df: DataFrame,
    columns_map: BTreeMap<String, String>,
    keys: Vec<String>,
    raw: Vec<Row>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Boolean,
    Integer,
    Float,
    Text,
}

impl Items {
    /// Builds the tabular view from JSON objects.
    ///
    /// `key` names where the items came from. Row keys come from `_key` when
    /// present, otherwise from the row position.
    pub fn from_rows(key: impl Into<String>, rows: Vec<Value>, expand: bool) -> Result<Self> {
        let key = key.into();
        let mut raw = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            match row {
                Value::Object(map) => raw.push(map),
                _ => return Err(ModelError::NotAnObject { index }),
            }
        }

        let keys = row_keys(&raw)?;
        let cells: Vec<Vec<(String, Value)>> = raw
            .iter()
            .map(|row| {
                row.iter()
                    .filter(|(name, _)| !is_bookkeeping(name))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect()
            })
            .collect();
        let df = build_frame(&cells, raw.len())?;

        let (flat_df, columns_map) = if expand {
            let top_level: HashSet<String> = df
                .get_columns()
                .iter()
                .map(|column| column.name().to_string())
                .collect();
            let mut columns_map = BTreeMap::new();
            let flat_cells: Vec<Vec<(String, Value)>> = cells
                .iter()
                .map(|row| flatten_row(row, &top_level, &mut columns_map))
                .collect();
            (build_frame(&flat_cells, raw.len())?, columns_map)
        } else {
            (df.clone(), BTreeMap::new())
        };

        debug!(
            source = %key,
            rows = raw.len(),
            columns = df.width(),
            flat_columns = flat_df.width(),
            "built items table"
        );

        Ok(Self {
            key,
            df,
            flat_df,
            columns_map,
            keys,
            raw,
        })
    }

    /// Source key the items were read from.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn flat_frame(&self) -> &DataFrame {
        &self.flat_df
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn raw(&self) -> &[Row] {
        &self.raw
    }

    /// Top-level column names in table order.
    pub fn columns(&self) -> Vec<String> {
        column_names(&self.df)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }

    /// Flat column name to the top-level field it was expanded from.
    pub fn columns_map(&self) -> &BTreeMap<String, String> {
        &self.columns_map
    }

    pub fn origin_column<'a>(&'a self, flat_name: &'a str) -> &'a str {
        self.columns_map
            .get(flat_name)
            .map(String::as_str)
            .unwrap_or(flat_name)
    }

    pub fn dtype(&self, name: &str) -> Option<DataType> {
        self.df.column(name).ok().map(|column| column.dtype().clone())
    }

    /// Cell texts of a top-level column, `None` for missing cells.
    pub fn column_texts(&self, name: &str) -> Result<Vec<Option<String>>> {
        read_column(&self.df, name, any_to_text)
    }

    /// Cells coerced to numbers; text that does not parse is `None`.
    pub fn column_numbers(&self, name: &str) -> Result<Vec<Option<f64>>> {
        read_column(&self.df, name, any_to_f64)
    }

    pub fn column_bools(&self, name: &str) -> Result<Vec<Option<bool>>> {
        read_column(&self.df, name, any_to_bool)
    }

    pub fn boolean_columns(&self) -> Vec<String> {
        self.df
            .get_columns()
            .iter()
            .filter(|column| column.dtype() == &DataType::Boolean)
            .map(|column| column.name().to_string())
            .collect()
    }

    /// Every text column of the flat frame with its cells.
    pub fn flat_text_columns(&self) -> Result<Vec<(String, Vec<Option<String>>)>> {
        self.flat_df
            .get_columns()
            .iter()
            .filter(|column| column.dtype() == &DataType::String)
            .map(|column| {
                let name = column.name().to_string();
                read_column(&self.flat_df, &name, any_to_text).map(|cells| (name, cells))
            })
            .collect()
    }

    pub fn non_missing_count(&self, name: &str) -> Result<usize> {
        let column = self
            .df
            .column(name)
            .map_err(|_| ModelError::ColumnNotFound {
                column: name.to_string(),
            })?;
        Ok(column.len() - column.null_count())
    }

    /// Non-missing counts of every top-level column.
    pub fn field_counts(&self) -> BTreeMap<String, usize> {
        self.df
            .get_columns()
            .iter()
            .map(|column| {
                (
                    column.name().to_string(),
                    column.len() - column.null_count(),
                )
            })
            .collect()
    }
}

fn is_bookkeeping(name: &str) -> bool {
    name == KEY_FIELD || name == TYPE_FIELD
}

pub(crate) fn column_names(frame: &DataFrame) -> Vec<String> {
    frame
        .get_columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect()
}

fn read_column<T>(
    frame: &DataFrame,
    name: &str,
    convert: impl Fn(AnyValue<'_>) -> Option<T>,
) -> Result<Vec<Option<T>>> {
    let column = frame.column(name).map_err(|_| ModelError::ColumnNotFound {
        column: name.to_string(),
    })?;
    Ok((0..column.len())
        .map(|idx| convert(column.get(idx).unwrap_or(AnyValue::Null)))
        .collect())
}

fn row_keys(rows: &[Row]) -> Result<Vec<String>> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut keys = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let key = match row.get(KEY_FIELD) {
            Some(Value::String(key)) => key.clone(),
            Some(Value::Null) | None => index.to_string(),
            Some(other) => other.to_string(),
        };
        if !seen.insert(key.clone()) {
            return Err(ModelError::DuplicateKey { key });
        }
        keys.push(key);
    }
    Ok(keys)
}

/// Empty containers count as missing, everything else is kept.
fn normalize(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.clone()),
    }
}

fn build_frame(rows: &[Vec<(String, Value)>], height: usize) -> Result<DataFrame> {
    let mut order: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut cells: Vec<Vec<Option<Value>>> = Vec::new();

    for (row_idx, row) in rows.iter().enumerate() {
        for (name, value) in row {
            let position = match positions.get(name) {
                Some(position) => *position,
                None => {
                    positions.insert(name.clone(), order.len());
                    order.push(name.clone());
                    cells.push(vec![None; height]);
                    order.len() - 1
                }
            };
            cells[position][row_idx] = normalize(value);
        }
    }

    let columns = order
        .iter()
        .zip(cells)
        .map(|(name, values)| typed_column(name, &values))
        .collect();
    Ok(DataFrame::new(columns)?)
}

fn infer_kind<'a>(values: impl Iterator<Item = &'a Value>) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for value in values {
        let this = match value {
            Value::Bool(_) => ColumnKind::Boolean,
            Value::Number(number) if number.is_i64() => ColumnKind::Integer,
            Value::Number(_) => ColumnKind::Float,
            _ => return ColumnKind::Text,
        };
        kind = Some(match (kind, this) {
            (None, this) => this,
            (Some(previous), this) if previous == this => this,
            (Some(ColumnKind::Integer), ColumnKind::Float)
            | (Some(ColumnKind::Float), ColumnKind::Integer) => ColumnKind::Float,
            _ => return ColumnKind::Text,
        });
    }
    kind.unwrap_or(ColumnKind::Text)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn typed_column(name: &str, values: &[Option<Value>]) -> Column {
    let series = match infer_kind(values.iter().flatten()) {
        ColumnKind::Boolean => Series::new(
            name.into(),
            values
                .iter()
                .map(|value| value.as_ref().and_then(Value::as_bool))
                .collect::<Vec<_>>(),
        ),
        ColumnKind::Integer => Series::new(
            name.into(),
            values
                .iter()
                .map(|value| value.as_ref().and_then(Value::as_i64))
                .collect::<Vec<_>>(),
        ),
        ColumnKind::Float => Series::new(
            name.into(),
            values
                .iter()
                .map(|value| value.as_ref().and_then(Value::as_f64))
                .collect::<Vec<_>>(),
        ),
        ColumnKind::Text => Series::new(
            name.into(),
            values
                .iter()
                .map(|value| value.as_ref().map(cell_text))
                .collect::<Vec<_>>(),
        ),
    };
    series.into_column()
}

fn flatten_row(
    row: &[(String, Value)],
    top_level: &HashSet<String>,
    columns_map: &mut BTreeMap<String, String>,
) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    for (name, value) in row {
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (child, inner) in map {
                    let flat = child_name(name, child, top_level);
                    flatten_value(flat, name, inner, &mut out, columns_map);
                }
            }
            Value::Array(items) if !items.is_empty() => {
                for (index, inner) in items.iter().enumerate() {
                    let flat = child_name(name, &index.to_string(), top_level);
                    flatten_value(flat, name, inner, &mut out, columns_map);
                }
            }
            _ => out.push((name.clone(), value.clone())),
        }
    }
    out
}

fn flatten_value(
    name: String,
    origin: &str,
    value: &Value,
    out: &mut Vec<(String, Value)>,
    columns_map: &mut BTreeMap<String, String>,
) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (child, inner) in map {
                flatten_value(format!("{name}_{child}"), origin, inner, out, columns_map);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, inner) in items.iter().enumerate() {
                flatten_value(format!("{name}_{index}"), origin, inner, out, columns_map);
            }
        }
        _ => {
            columns_map
                .entry(name.clone())
                .or_insert_with(|| origin.to_string());
            out.push((name, value.clone()));
        }
    }
}

/// Expanded name that does not shadow an existing top-level column.
fn child_name(parent: &str, child: &str, top_level: &HashSet<String>) -> String {
    let mut name = format!("{parent}_{child}");
    while top_level.contains(&name) {
        name.push('_');
    }
    name
}
