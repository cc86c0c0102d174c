//! Permissive casting of raw JSON values into typed fields.
//!
//! A value that cannot be cast becomes `None` and the record is kept.
//! Absent keys and JSON `null` are plain nulls; values that are present but
//! uncastable are counted as failures so a run can report them.

use serde_json::{Map, Value};

/// Field caster that tracks how many present values failed to cast
#[derive(Debug, Default, Clone)]
pub struct Coercer {
    failures: usize,
}

impl Coercer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of present values that could not be cast
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Text field. Scalars are rendered as text, nested values as compact JSON.
    pub fn text(&mut self, fields: &Map<String, Value>, key: &str) -> Option<String> {
        match fields.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn int32(&mut self, fields: &Map<String, Value>, key: &str) -> Option<i32> {
        let value = self.int64(fields, key)?;
        match i32::try_from(value) {
            Ok(v) => Some(v),
            Err(_) => self.fail(),
        }
    }

    pub fn int64(&mut self, fields: &Map<String, Value>, key: &str) -> Option<i64> {
        match fields.get(key)? {
            Value::Null => None,
            Value::Number(n) => match n.as_i64() {
                Some(v) => Some(v),
                None => match n.as_f64().and_then(truncate_to_i64) {
                    Some(v) => Some(v),
                    None => self.fail(),
                },
            },
            Value::String(s) => match parse_integer(s) {
                Some(v) => Some(v),
                None => self.fail(),
            },
            _ => self.fail(),
        }
    }

    pub fn float64(&mut self, fields: &Map<String, Value>, key: &str) -> Option<f64> {
        match fields.get(key)? {
            Value::Null => None,
            Value::Number(n) => match n.as_f64() {
                Some(v) if v.is_finite() => Some(v),
                _ => self.fail(),
            },
            // f64 parsing accepts "NaN" and "inf"
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Some(v),
                _ => self.fail(),
            },
            _ => self.fail(),
        }
    }

    fn fail<T>(&mut self) -> Option<T> {
        self.failures += 1;
        None
    }
}

fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().and_then(truncate_to_i64))
}

fn truncate_to_i64(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let truncated = value.trunc();
    // i64::MAX as f64 rounds up to 2^63
    if truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
        Some(truncated as i64)
    } else {
        None
    }
}
