//! Run orchestration.
//!
//! A run connects, loads both datasets, inserts them, creates the indexes and
//! exports the four report queries. Only a missing connection or unreadable
//! input stops a run early; every other failure is logged, recorded in the
//! [`RunReport`] and the remaining independent steps still run. The gateway is
//! closed exactly once on every path.

use crate::config::Credentials;
use crate::core::db::{self, statements, Gateway};
use crate::core::{EtlError, Result, Value};
use crate::export::{self, OutputFormat};
use crate::input::{self, Record, Room, Student};
use crate::progress::ProgressTracker;
use chrono::NaiveDate;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Directory results are written to unless told otherwise.
pub const DEFAULT_OUTPUT_DIR: &str = "results";

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub students_path: PathBuf,
    pub rooms_path: PathBuf,
    pub format: OutputFormat,
    pub output_dir: PathBuf,
    /// Date ages are measured against.
    pub reference_date: NaiveDate,
    pub show_progress: bool,
}

impl PipelineOptions {
    /// Options with the default output directory, today's date and no
    /// progress bars.
    pub fn new(students_path: impl Into<PathBuf>, rooms_path: impl Into<PathBuf>, format: OutputFormat) -> Self {
        PipelineOptions {
            students_path: students_path.into(),
            rooms_path: rooms_path.into(),
            format,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            reference_date: chrono::Local::now().date_naive(),
            show_progress: false,
        }
    }
}

/// Steps that can fail without ending the run. Query and export steps carry
/// their 1-based query number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Insert,
    Indexes,
    OutputDir,
    Query(usize),
    Export(usize),
    Close,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Insert => f.write_str("insert"),
            Step::Indexes => f.write_str("indexes"),
            Step::OutputDir => f.write_str("output directory"),
            Step::Query(n) => write!(f, "query {}", n),
            Step::Export(n) => write!(f, "export {}", n),
            Step::Close => f.write_str("close"),
        }
    }
}

#[derive(Debug)]
pub struct StepFailure {
    pub step: Step,
    pub error: EtlError,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub rooms_inserted: usize,
    pub students_inserted: usize,
    pub indexes_created: bool,
    /// Files written, in query order.
    pub outputs: Vec<PathBuf>,
    pub failures: Vec<StepFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed(&self, step: Step) -> bool {
        self.failures.iter().any(|f| f.step == step)
    }

    fn record(&mut self, step: Step, error: EtlError) {
        error!(step = %step, kind = %error.kind(), "{}", error);
        self.failures.push(StepFailure { step, error });
    }
}

pub struct Pipeline {
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Pipeline { options }
    }

    /// Connects with `credentials` and performs the run.
    ///
    /// # Errors
    ///
    /// `EtlError::Connection` when the database is unreachable and
    /// `EtlError::FileRead` when an input file cannot be loaded. Failures of
    /// later steps are reported through [`RunReport::failures`].
    pub fn run(&self, credentials: &Credentials) -> Result<RunReport> {
        let gateway = db::connect(credentials).map_err(|e| {
            error!(kind = %e.kind(), "Failed to connect to database: {}", e);
            e
        })?;
        self.run_with_gateway(gateway)
    }

    /// Performs the run on an already connected gateway, which is closed
    /// before returning.
    pub fn run_with_gateway(&self, mut gateway: Box<dyn Gateway>) -> Result<RunReport> {
        let (rooms, students) = match self.load_inputs() {
            Ok(data) => data,
            Err(e) => {
                error!(kind = %e.kind(), "{}", e);
                if let Err(close_err) = gateway.close() {
                    warn!("Failed to close database connection: {}", close_err);
                }
                return Err(e);
            }
        };

        let mut report = RunReport::default();
        self.execute_steps(gateway.as_mut(), &rooms, &students, &mut report);

        match gateway.close() {
            Ok(()) => info!("Database connection closed"),
            Err(e) => report.record(Step::Close, e),
        }
        Ok(report)
    }

    fn load_inputs(&self) -> Result<(Vec<Room>, Vec<Student>)> {
        let rooms = input::read_rooms(&self.options.rooms_path)?;
        let students = input::read_students(&self.options.students_path)?;
        info!(rooms = rooms.len(), students = students.len(), "Input files loaded");
        Ok((rooms, students))
    }

    fn execute_steps(
        &self,
        gateway: &mut dyn Gateway,
        rooms: &[Room],
        students: &[Student],
        report: &mut RunReport,
    ) {
        match insert_records(gateway, rooms, students, self.options.show_progress) {
            Ok((room_count, student_count)) => {
                report.rooms_inserted = room_count;
                report.students_inserted = student_count;
            }
            Err(e) => report.record(Step::Insert, e),
        }

        match create_indexes(gateway) {
            Ok(()) => report.indexes_created = true,
            Err(e) => report.record(Step::Indexes, e),
        }

        let output_dir = &self.options.output_dir;
        if !output_dir.exists() {
            match fs::create_dir_all(output_dir) {
                Ok(()) => info!(path = %output_dir.display(), "Output directory created"),
                Err(e) => report.record(Step::OutputDir, e.into()),
            }
        }

        self.run_queries(gateway, report);
    }

    fn run_queries(&self, gateway: &mut dyn Gateway, report: &mut RunReport) {
        let catalog = statements(gateway.driver());
        for (i, query) in catalog.queries.iter().enumerate() {
            let number = i + 1;
            let params = if query.uses_reference_date {
                vec![Value::Date(self.options.reference_date)]
            } else {
                Vec::new()
            };

            let result = match db::query(gateway, query.sql, &params) {
                Ok(result) => result,
                Err(e) => {
                    report.record(Step::Query(number), e);
                    continue;
                }
            };
            info!(query = query.name, rows = result.row_count(), "Query {} executed", number);

            let path = export::output_path(&self.options.output_dir, number, self.options.format);
            match export::write(&result, self.options.format, &path) {
                Ok(()) => report.outputs.push(path),
                Err(e) => report.record(Step::Export(number), e),
            }
        }
    }
}

/// Inserts every room, then every student, one statement per record, and
/// commits once at the end. The first failing insert abandons the rest.
///
/// Returns the number of rooms and students inserted.
pub fn insert_records(
    gateway: &mut dyn Gateway,
    rooms: &[Room],
    students: &[Student],
    show_progress: bool,
) -> Result<(usize, usize)> {
    let sql = statements(gateway.driver());
    let room_count = insert_all(gateway, sql.insert_room, rooms, show_progress)?;
    let student_count = insert_all(gateway, sql.insert_student, students, show_progress)?;
    gateway.commit()?;
    info!(rooms = room_count, students = student_count, "Data inserted");
    Ok((room_count, student_count))
}

fn insert_all<R: Record>(
    gateway: &mut dyn Gateway,
    sql: &str,
    records: &[R],
    show_progress: bool,
) -> Result<usize> {
    let label = format!("Inserting into {}", R::TABLE);
    let mut tracker = ProgressTracker::new(records.len() as u64, &label, show_progress);
    for record in records {
        if let Err(e) = gateway.execute(sql, &record.params()) {
            tracker.finish();
            return Err(match e {
                EtlError::Query(msg) => {
                    EtlError::Query(format!("inserting {} {}: {}", R::TABLE, record.id(), msg))
                }
                other => other,
            });
        }
        tracker.inc();
    }
    tracker.finish();
    Ok(tracker.processed() as usize)
}

/// Creates the room name, student birthday and student room indexes if they
/// do not exist yet, then commits.
pub fn create_indexes(gateway: &mut dyn Gateway) -> Result<()> {
    for (name, sql) in statements(gateway.driver()).indexes.iter() {
        gateway.execute(sql, &[])?;
        info!("Index {} created", name);
    }
    gateway.commit()?;
    info!("Indexes created successfully");
    Ok(())
}
