//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use roomstat::config::Credentials;
use roomstat::core::db::Driver;
use roomstat::export::OutputFormat;
use roomstat::PipelineOptions;
use rusqlite::Connection;
use std::path::PathBuf;
use tempfile::TempDir;

pub const SCHEMA: &str = "
    CREATE TABLE room (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE student (
        id INTEGER PRIMARY KEY,
        birthday DATE NOT NULL,
        name TEXT NOT NULL,
        room INTEGER NOT NULL REFERENCES room(id),
        sex TEXT NOT NULL
    );
";

pub fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

/// A temporary workspace with a prepared SQLite database and input files.
pub struct Fixture {
    pub dir: TempDir,
    pub db_path: PathBuf,
    pub rooms_path: PathBuf,
    pub students_path: PathBuf,
    pub output_dir: PathBuf,
}

impl Fixture {
    pub fn new(rooms_json: &str, students_json: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("campus.db");
        Connection::open(&db_path).unwrap().execute_batch(SCHEMA).unwrap();

        let rooms_path = dir.path().join("rooms.json");
        let students_path = dir.path().join("students.json");
        std::fs::write(&rooms_path, rooms_json).unwrap();
        std::fs::write(&students_path, students_json).unwrap();
        let output_dir = dir.path().join("results");

        Fixture {
            dir,
            db_path,
            rooms_path,
            students_path,
            output_dir,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            driver: Driver::Sqlite,
            username: String::new(),
            password: String::new(),
            host: String::new(),
            port: 0,
            database: self.db_path.to_str().unwrap().to_string(),
        }
    }

    pub fn options(&self, format: OutputFormat) -> PipelineOptions {
        let mut options = PipelineOptions::new(&self.students_path, &self.rooms_path, format);
        options.output_dir = self.output_dir.clone();
        options.reference_date = reference_date();
        options
    }

    pub fn count(&self, table: &str) -> i64 {
        Connection::open(&self.db_path)
            .unwrap()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    pub fn output(&self, index: usize, format: OutputFormat) -> PathBuf {
        roomstat::export::output_path(&self.output_dir, index, format)
    }

    pub fn read_json(&self, index: usize) -> serde_json::Value {
        let text = std::fs::read_to_string(self.output(index, OutputFormat::Json)).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    pub fn read_xml(&self, index: usize) -> ParsedXml {
        parse_xml(&std::fs::read_to_string(self.output(index, OutputFormat::Xml)).unwrap())
    }
}

/// The parts of an exported XML document the tests look at.
#[derive(Debug, Default, PartialEq)]
pub struct ParsedXml {
    pub root: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<(String, String)>>,
}

pub fn parse_xml(xml: &str) -> ParsedXml {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut parsed = ParsedXml::default();
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if path.is_empty() {
                    parsed.root = name.clone();
                }
                if path.len() == 2 && path[1] == "rows" {
                    parsed.rows.push(Vec::new());
                }
                path.push(name);
                text.clear();
            }
            Ok(Event::Text(e)) => {
                text = e.unescape().unwrap().into_owned();
            }
            Ok(Event::End(_)) => {
                let name = path.pop().unwrap();
                if path.len() == 2 && path[1] == "columns" {
                    parsed.columns.push(text.clone());
                } else if path.len() == 3 && path[1] == "rows" {
                    parsed.rows.last_mut().unwrap().push((name, text.clone()));
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => panic!("invalid XML at {}: {}", reader.buffer_position(), e),
        }
        buf.clear();
    }
    parsed
}

/// Whole years between `birthday` and `on`.
pub fn age(birthday: NaiveDate, on: NaiveDate) -> i64 {
    use chrono::Datelike;
    let mut years = i64::from(on.year() - birthday.year());
    if (on.month(), on.day()) < (birthday.month(), birthday.day()) {
        years -= 1;
    }
    years
}
