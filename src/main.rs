use chrono::NaiveDate;
use clap::Parser;
use roomstat::config::{self, Credentials};
use roomstat::export::OutputFormat;
use roomstat::pipeline::{Pipeline, PipelineOptions};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Load rooms and students into the database and export the room reports.
///
/// Example: roomstat source/students.json source/rooms.json json
#[derive(Debug, Parser)]
#[command(name = "roomstat", version, about)]
struct Cli {
    /// Path to the students file
    students: PathBuf,

    /// Path to the rooms file
    rooms: PathBuf,

    /// Output format
    #[arg(value_enum)]
    format: OutputFormat,

    /// Directory the four result files are written to
    #[arg(short, long, default_value = roomstat::pipeline::DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// TOML file with DB_* connection settings (defaults to ./roomstat.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Date ages are computed against (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    reference_date: Option<NaiveDate>,

    /// Do not draw progress bars while inserting
    #[arg(long)]
    no_progress: bool,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn initialize_logging(cli: &Cli) {
    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };

    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr);

    match EnvFilter::try_from_default_env() {
        Ok(filter) => subscriber.with_env_filter(filter).init(),
        Err(_) => subscriber.with_max_level(level).init(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    initialize_logging(&cli);

    info!("Starting roomstat...");

    let credentials = match config::load(cli.config.as_deref()).and_then(|map| Credentials::from_map(&map)) {
        Ok(credentials) => credentials,
        Err(e) => {
            error!(kind = %e.kind(), "{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut options = PipelineOptions::new(cli.students.clone(), cli.rooms.clone(), cli.format);
    options.output_dir = cli.output_dir.clone();
    if let Some(date) = cli.reference_date {
        options.reference_date = date;
    }
    options.show_progress = !cli.no_progress && std::io::stderr().is_terminal();

    match Pipeline::new(options).run(&credentials) {
        Ok(report) if report.is_success() => {
            info!(files = report.outputs.len(), "Run finished");
            ExitCode::SUCCESS
        }
        Ok(report) => {
            warn!(
                failures = report.failures.len(),
                files = report.outputs.len(),
                "Run finished with failures"
            );
            ExitCode::FAILURE
        }
        Err(_) => ExitCode::FAILURE,
    }
}
