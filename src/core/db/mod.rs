/// Database Module
///
/// This module provides the database gateway used by a run: one connection,
/// owned exclusively by the pipeline, that executes parameterized SQL and
/// hands back tabular results.
///
/// ## Architecture
///
/// - **Gateway** (this file): the backend-neutral trait and the `connect` factory
/// - **PostgreSQL** (`postgres.rs`): synchronous client on the `postgres` crate
/// - **SQLite** (`sqlite.rs`): `rusqlite` connection to a file or in-memory database
/// - **Dialect** (`dialect.rs`): the SQL text each backend runs
///
/// ## Transactions
///
/// Gateways never auto-commit. A transaction is opened lazily before the first
/// statement after a commit and only `commit` persists it. A failing statement
/// discards the open transaction so the connection stays usable.
pub mod dialect;
pub mod postgres;
pub mod sqlite;

pub use dialect::{statements, AnalyticalQuery, Statements};
pub use self::postgres::PostgresGateway;
pub use sqlite::SqliteGateway;

use crate::config::Credentials;
use crate::core::{EtlError, Result, TabularResult, Value};
use std::fmt;
use std::str::FromStr;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Postgres,
    Sqlite,
}

impl FromStr for Driver {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Driver::Postgres),
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            other => Err(EtlError::Config(format!(
                "Unsupported DB_DRIVER: '{}'. Supported drivers: postgres, sqlite",
                other
            ))),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::Postgres => f.write_str("postgres"),
            Driver::Sqlite => f.write_str("sqlite"),
        }
    }
}

/// A single database connection with cursor-like semantics.
pub trait Gateway {
    /// Backend behind this gateway, used to pick the SQL dialect.
    fn driver(&self) -> Driver;

    /// Runs one statement with positionally bound parameters.
    ///
    /// Row-returning statements buffer their rows for [`Gateway::fetch_all`]
    /// and return the row count; other statements return the affected-row count.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Takes the result set of the last executed statement.
    ///
    /// Fails with `EtlError::Query` when no result set is pending.
    fn fetch_all(&mut self) -> Result<TabularResult>;

    /// Persists everything executed since the last commit.
    fn commit(&mut self) -> Result<()>;

    /// Releases the connection. Uncommitted work is rolled back.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Opens a gateway for the backend named by `credentials.driver`.
///
/// # Errors
///
/// Returns `EtlError::Connection` when the database cannot be reached.
pub fn connect(credentials: &Credentials) -> Result<Box<dyn Gateway>> {
    let gateway: Box<dyn Gateway> = match credentials.driver {
        Driver::Postgres => Box::new(PostgresGateway::connect(credentials)?),
        Driver::Sqlite => Box::new(SqliteGateway::open(&credentials.database)?),
    };
    tracing::info!(
        driver = %credentials.driver,
        database = %credentials.database,
        "Connected to database"
    );
    Ok(gateway)
}

/// Executes a row-returning statement and collects its result set.
pub fn query(gateway: &mut dyn Gateway, sql: &str, params: &[Value]) -> Result<TabularResult> {
    gateway.execute(sql, params)?;
    gateway.fetch_all()
}
