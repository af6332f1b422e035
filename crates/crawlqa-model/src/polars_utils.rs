//! Polars AnyValue helpers used when reading item cells.

use polars::prelude::*;

/// Renders a cell as text. Null becomes an empty string.
pub fn any_to_string(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Int8(v) => v.to_string(),
        AnyValue::Int16(v) => v.to_string(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt8(v) => v.to_string(),
        AnyValue::UInt16(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::UInt64(v) => v.to_string(),
        AnyValue::Float32(v) => format_numeric(f64::from(v)),
        AnyValue::Float64(v) => format_numeric(v),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Boolean(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Renders a cell as text, `None` for null.
pub fn any_to_text(value: AnyValue<'_>) -> Option<String> {
    match value {
        AnyValue::Null => None,
        other => Some(any_to_string(other)),
    }
}

/// Shortest decimal form of a float; `NaN` is rendered as `nan`.
pub fn format_numeric(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    format!("{v}")
}

/// Converts a cell to f64. Strings are parsed, booleans and nulls are `None`.
pub fn any_to_f64(value: AnyValue<'_>) -> Option<f64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int8(v) => Some(f64::from(v)),
        AnyValue::Int16(v) => Some(f64::from(v)),
        AnyValue::Int32(v) => Some(f64::from(v)),
        AnyValue::Int64(v) => Some(v as f64),
        AnyValue::UInt8(v) => Some(f64::from(v)),
        AnyValue::UInt16(v) => Some(f64::from(v)),
        AnyValue::UInt32(v) => Some(f64::from(v)),
        AnyValue::UInt64(v) => Some(v as f64),
        AnyValue::Float32(v) => Some(f64::from(v)),
        AnyValue::Float64(v) => Some(v),
        AnyValue::String(s) => parse_f64(s),
        AnyValue::StringOwned(s) => parse_f64(&s),
        _ => None,
    }
}

pub fn any_to_bool(value: AnyValue<'_>) -> Option<bool> {
    match value {
        AnyValue::Boolean(b) => Some(b),
        _ => None,
    }
}

/// Parses a string as a finite f64.
pub fn parse_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| !v.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_render_without_trailing_zeros() {
        assert_eq!(any_to_string(AnyValue::Float64(10.0)), "10");
        assert_eq!(any_to_string(AnyValue::Float64(0.25)), "0.25");
        assert_eq!(any_to_string(AnyValue::Int64(-3)), "-3");
        assert_eq!(any_to_string(AnyValue::Boolean(true)), "true");
    }

    #[test]
    fn text_is_none_for_null() {
        assert_eq!(any_to_text(AnyValue::Null), None);
        assert_eq!(any_to_text(AnyValue::String("")), Some(String::new()));
    }

    #[test]
    fn strings_are_parsed_as_numbers() {
        assert_eq!(any_to_f64(AnyValue::String(" 1.5 ")), Some(1.5));
        assert_eq!(any_to_f64(AnyValue::String("abc")), None);
        assert_eq!(any_to_f64(AnyValue::String("nan")), None);
        assert_eq!(any_to_f64(AnyValue::Boolean(true)), None);
    }
}
