/// SQLite Gateway Module
///
/// `rusqlite` backed gateway. Used for file databases and, with `:memory:`,
/// for self-contained runs in tests.
use super::{Driver, Gateway};
use crate::core::{EtlError, Result, TabularResult, Value};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, warn};

pub struct SqliteGateway {
    connection: Connection,
    pending: Option<TabularResult>,
}

impl SqliteGateway {
    /// Opens the database at `path`, or an in-memory one for `":memory:"`.
    ///
    /// # Errors
    ///
    /// Returns `EtlError::Connection` if the file cannot be opened.
    pub fn open(path: &str) -> Result<Self> {
        let connection = Connection::open(path)
            .map_err(|e| EtlError::Connection(format!("cannot open {}: {}", path, e)))?;
        Self::from_connection(connection)
    }

    /// Wraps an already opened connection.
    pub fn from_connection(connection: Connection) -> Result<Self> {
        connection
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| EtlError::Connection(e.to_string()))?;
        Ok(SqliteGateway {
            connection,
            pending: None,
        })
    }

    /// Direct access to the underlying connection, e.g. to prepare a schema.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    fn begin(&self) -> Result<()> {
        if self.connection.is_autocommit() {
            self.connection.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn discard(&self) {
        if !self.connection.is_autocommit() {
            if let Err(e) = self.connection.execute_batch("ROLLBACK") {
                warn!("Rollback after failed statement did not complete: {}", e);
            }
        }
    }
}

impl Gateway for SqliteGateway {
    fn driver(&self) -> Driver {
        Driver::Sqlite
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.pending = None;
        self.begin()?;
        match run_statement(&self.connection, sql, params) {
            Ok((count, result)) => {
                self.pending = result;
                Ok(count)
            }
            Err(e) => {
                self.discard();
                Err(e)
            }
        }
    }

    fn fetch_all(&mut self) -> Result<TabularResult> {
        self.pending
            .take()
            .ok_or_else(|| EtlError::Query("no result set is pending".to_string()))
    }

    fn commit(&mut self) -> Result<()> {
        if !self.connection.is_autocommit() {
            if let Err(e) = self.connection.execute_batch("COMMIT") {
                self.discard();
                return Err(e.into());
            }
            debug!("Transaction committed");
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.discard();
        this.connection
            .close()
            .map_err(|(_, e)| EtlError::Query(format!("failed to close connection: {}", e)))
    }
}

fn run_statement(
    connection: &Connection,
    sql: &str,
    params: &[Value],
) -> Result<(u64, Option<TabularResult>)> {
    let mut stmt = connection.prepare(sql)?;

    if stmt.column_count() == 0 {
        let changed = stmt.execute(params_from_iter(params.iter()))?;
        debug!(changed, "Statement executed");
        return Ok((changed as u64, None));
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut data = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(convert_value(row.get_ref(i)?, &columns[i])?);
        }
        data.push(values);
    }

    let count = data.len() as u64;
    debug!(rows = count, "Query returned rows");
    Ok((count, Some(TabularResult::new(columns, data)?)))
}

fn convert_value(value: ValueRef<'_>, column: &str) -> Result<Value> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(i) => Ok(Value::Integer(i)),
        ValueRef::Real(f) => Ok(Value::Real(f)),
        ValueRef::Text(t) => Ok(Value::Text(String::from_utf8_lossy(t).into_owned())),
        ValueRef::Blob(_) => Err(EtlError::Query(format!(
            "column {} holds a BLOB, which cannot be exported",
            column
        ))),
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Date(d) => ToSqlOutput::Owned(SqlValue::Text(d.format("%Y-%m-%d").to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn setup_gateway() -> Box<SqliteGateway> {
        let gateway = SqliteGateway::open(":memory:").unwrap();
        gateway
            .connection()
            .execute_batch(
                "
                CREATE TABLE room (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
                CREATE TABLE student (
                    id INTEGER PRIMARY KEY,
                    birthday DATE NOT NULL,
                    name TEXT NOT NULL,
                    room INTEGER NOT NULL REFERENCES room(id),
                    sex TEXT NOT NULL
                );
            ",
            )
            .unwrap();
        Box::new(gateway)
    }

    fn count(gateway: &SqliteGateway, table: &str) -> i64 {
        gateway
            .connection()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_execute_and_fetch_all() {
        let mut gateway = setup_gateway();
        gateway
            .execute("INSERT INTO room(id, name) VALUES (?1, ?2)", &[Value::Integer(1), "Room A".into()])
            .unwrap();
        gateway.execute("SELECT id, name FROM room", &[]).unwrap();
        let result = gateway.fetch_all().unwrap();
        assert_eq!(result.columns(), &["id".to_string(), "name".to_string()]);
        assert_eq!(result.rows(), &[vec![Value::Integer(1), Value::from("Room A")]]);
    }

    #[test]
    fn test_fetch_without_result_set_fails() {
        let mut gateway = setup_gateway();
        assert!(matches!(gateway.fetch_all(), Err(EtlError::Query(_))));

        gateway
            .execute("INSERT INTO room(id, name) VALUES (?1, ?2)", &[Value::Integer(1), "A".into()])
            .unwrap();
        assert!(matches!(gateway.fetch_all(), Err(EtlError::Query(_))));

        // A result set can only be taken once
        gateway.execute("SELECT 1", &[]).unwrap();
        assert!(gateway.fetch_all().is_ok());
        assert!(gateway.fetch_all().is_err());
    }

    #[test]
    fn test_commit_persists_and_failure_discards_batch() {
        let mut gateway = setup_gateway();
        gateway
            .execute("INSERT INTO room(id, name) VALUES (?1, ?2)", &[Value::Integer(1), "A".into()])
            .unwrap();
        gateway.commit().unwrap();
        assert_eq!(count(&gateway, "room"), 1);

        gateway
            .execute("INSERT INTO room(id, name) VALUES (?1, ?2)", &[Value::Integer(2), "B".into()])
            .unwrap();
        let duplicate = gateway.execute(
            "INSERT INTO room(id, name) VALUES (?1, ?2)",
            &[Value::Integer(1), "again".into()],
        );
        assert!(matches!(duplicate, Err(EtlError::Query(_))));
        gateway.commit().unwrap();

        // Room 2 belonged to the failed batch
        assert_eq!(count(&gateway, "room"), 1);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let mut gateway = setup_gateway();
        let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let result = gateway.execute(
            "INSERT INTO student(id, birthday, name, room, sex) VALUES (?1, ?2, ?3, ?4, ?5)",
            &[Value::Integer(1), date.into(), "Alice".into(), Value::Integer(99), "F".into()],
        );
        assert!(matches!(result, Err(EtlError::Query(_))));
    }

    #[test]
    fn test_dates_bind_as_iso_text() {
        let mut gateway = setup_gateway();
        let date = NaiveDate::from_ymd_opt(2001, 2, 3).unwrap();
        gateway.execute("SELECT ?1 AS d", &[date.into()]).unwrap();
        let result = gateway.fetch_all().unwrap();
        assert_eq!(result.get(0, "d"), Some(&Value::from("2001-02-03")));
    }

    #[test]
    fn test_malformed_sql_is_query_error() {
        let mut gateway = setup_gateway();
        match gateway.execute("SELEC nothing", &[]) {
            Err(EtlError::Query(msg)) => assert!(msg.contains("syntax")),
            other => panic!("Expected Query error, got {:?}", other),
        }
    }

    #[test]
    fn test_close_rolls_back_uncommitted_work() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("campus.db");
        let path = path.to_str().unwrap();

        let gateway = SqliteGateway::open(path).unwrap();
        gateway
            .connection()
            .execute_batch("CREATE TABLE room (id INTEGER PRIMARY KEY, name TEXT);")
            .unwrap();
        let mut gateway = Box::new(gateway);
        gateway
            .execute("INSERT INTO room(id, name) VALUES (?1, ?2)", &[Value::Integer(1), "A".into()])
            .unwrap();
        gateway.close().unwrap();

        let reopened = SqliteGateway::open(path).unwrap();
        assert_eq!(count(&reopened, "room"), 0);
    }
}
