/// Query Values Module
///
/// Dynamically typed cell values and the tabular result shape shared by the
/// database layer and the exporters.
use crate::core::{EtlError, Result};
use chrono::NaiveDate;
use std::fmt;

/// A single cell value as produced by a database driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    /// Converts the value into its JSON counterpart: numbers stay numeric,
    /// dates become `YYYY-MM-DD` strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            // from_f64 rejects NaN and infinities
            Value::Real(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
        }
    }
}

/// String representation used wherever a value is rendered as text (XML
/// element content). `Null` renders as the empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

/// Ordered column names plus ordered rows, each row positionally aligned
/// with `columns`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularResult {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TabularResult {
    /// Builds a result, rejecting rows whose width differs from the column list.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(EtlError::Query(format!(
                "row {} has {} values but the result has {} columns",
                index,
                row.len(),
                columns.len()
            )));
        }
        Ok(TabularResult { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Iterates rows as `(column, value)` pairs in column order.
    pub fn records(&self) -> impl Iterator<Item = Vec<(&str, &Value)>> + '_ {
        self.rows.iter().map(move |row| {
            self.columns
                .iter()
                .map(String::as_str)
                .zip(row.iter())
                .collect()
        })
    }

    /// Looks up a cell by row index and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TabularResult {
        TabularResult::new(
            vec!["room_id".into(), "room_name".into()],
            vec![
                vec![Value::Integer(1), Value::from("Room A")],
                vec![Value::Integer(2), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let result = TabularResult::new(
            vec!["a".into(), "b".into()],
            vec![vec![Value::Integer(1)]],
        );
        assert!(matches!(result, Err(EtlError::Query(_))));
    }

    #[test]
    fn test_records_follow_column_order() {
        let result = sample();
        let records: Vec<_> = result.records().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0][0], ("room_id", &Value::Integer(1)));
        assert_eq!(records[0][1], ("room_name", &Value::from("Room A")));
        assert_eq!(result.get(1, "room_name"), Some(&Value::Null));
        assert_eq!(result.get(0, "missing"), None);
    }

    #[test]
    fn test_value_rendering() {
        let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        assert_eq!(Value::Date(date).to_string(), "2000-01-01");
        assert_eq!(Value::Date(date).to_json(), serde_json::json!("2000-01-01"));
        assert_eq!(Value::Integer(7).to_json(), serde_json::json!(7));
        assert_eq!(Value::Real(f64::NAN).to_json(), serde_json::Value::Null);
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Real(2.5).to_string(), "2.5");
    }
}
