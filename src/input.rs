//! Input datasets.
//!
//! Rooms and students arrive as JSON arrays. Birthdays are accepted either as
//! plain dates (`2000-01-01`) or as timestamps whose date part comes first
//! (`2000-01-01T00:00:00.000000`).

use crate::core::{EtlError, Result, Value};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Student {
    pub id: i64,
    #[serde(deserialize_with = "deserialize_birthday")]
    pub birthday: NaiveDate,
    pub name: String,
    pub room: i64,
    pub sex: String,
}

/// A dataset entry that maps onto one single-row insert.
pub trait Record {
    /// Table the record is inserted into.
    const TABLE: &'static str;

    fn id(&self) -> i64;

    /// Insert parameters in the table's column order.
    fn params(&self) -> Vec<Value>;
}

impl Record for Room {
    const TABLE: &'static str = "room";

    fn id(&self) -> i64 {
        self.id
    }

    fn params(&self) -> Vec<Value> {
        vec![Value::Integer(self.id), Value::from(self.name.as_str())]
    }
}

impl Record for Student {
    const TABLE: &'static str = "student";

    fn id(&self) -> i64 {
        self.id
    }

    fn params(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            Value::Date(self.birthday),
            Value::from(self.name.as_str()),
            Value::Integer(self.room),
            Value::from(self.sex.as_str()),
        ]
    }
}

fn deserialize_birthday<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_birthday(&raw).map_err(serde::de::Error::custom)
}

fn parse_birthday(raw: &str) -> std::result::Result<NaiveDate, String> {
    let date_part = raw
        .split(|c: char| c == 'T' || c == ' ')
        .next()
        .unwrap_or_default();
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| format!("invalid birthday '{}': {}", raw, e))
}

fn read_json<T, P>(path: P) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| EtlError::file_read(path, e))?;
    serde_json::from_str(&content).map_err(|e| EtlError::file_read(path, e))
}

pub fn read_rooms<P: AsRef<Path>>(path: P) -> Result<Vec<Room>> {
    read_json(path)
}

pub fn read_students<P: AsRef<Path>>(path: P) -> Result<Vec<Student>> {
    read_json(path)
}
