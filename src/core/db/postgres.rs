/// PostgreSQL Gateway Module
///
/// Synchronous gateway on the `postgres` crate. Column values are converted
/// from their wire types into [`Value`]s as rows are fetched.
use super::{Driver, Gateway};
use crate::config::Credentials;
use crate::core::{EtlError, Result, TabularResult, Value};
use ::postgres::types::{ToSql, Type};
use ::postgres::{Client, Config, NoTls, Row};
use chrono::NaiveDate;
use tracing::{debug, warn};

pub struct PostgresGateway {
    client: Client,
    pending: Option<TabularResult>,
    in_transaction: bool,
}

impl PostgresGateway {
    /// Connects with the host, port, user, password and database name from
    /// `credentials`.
    ///
    /// # Errors
    ///
    /// Returns `EtlError::Connection` if the server cannot be reached or
    /// rejects the login.
    pub fn connect(credentials: &Credentials) -> Result<Self> {
        let mut config = Config::new();
        config
            .host(&credentials.host)
            .port(credentials.port)
            .user(&credentials.username)
            .password(&credentials.password)
            .dbname(&credentials.database);

        let client = config.connect(NoTls).map_err(|e| {
            EtlError::Connection(format!(
                "cannot connect to {}:{}/{}: {}",
                credentials.host, credentials.port, credentials.database, e
            ))
        })?;

        Ok(PostgresGateway {
            client,
            pending: None,
            in_transaction: false,
        })
    }

    fn begin(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.client.batch_execute("BEGIN")?;
            self.in_transaction = true;
        }
        Ok(())
    }

    fn discard(&mut self) {
        if self.in_transaction {
            if let Err(e) = self.client.batch_execute("ROLLBACK") {
                warn!("Rollback after failed statement did not complete: {}", e);
            }
            self.in_transaction = false;
        }
    }

    fn run_statement(&mut self, sql: &str, params: &[Value]) -> Result<(u64, Option<TabularResult>)> {
        let stmt = self.client.prepare(sql)?;
        let bound: Vec<Box<dyn ToSql + Sync>> = params.iter().map(to_param).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| &**p).collect();

        if stmt.columns().is_empty() {
            let changed = self.client.execute(&stmt, &refs)?;
            debug!(changed, "Statement executed");
            return Ok((changed, None));
        }

        let columns: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();
        let rows = self.client.query(&stmt, &refs)?;
        let data = rows
            .iter()
            .map(convert_row)
            .collect::<Result<Vec<_>>>()?;

        let count = data.len() as u64;
        debug!(rows = count, "Query returned rows");
        Ok((count, Some(TabularResult::new(columns, data)?)))
    }
}

impl Gateway for PostgresGateway {
    fn driver(&self) -> Driver {
        Driver::Postgres
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.pending = None;
        self.begin()?;
        match self.run_statement(sql, params) {
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
        if self.in_transaction {
            self.in_transaction = false;
            self.client.batch_execute("COMMIT")?;
            debug!("Transaction committed");
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        this.discard();
        this.client
            .close()
            .map_err(|e| EtlError::Query(format!("failed to close connection: {}", e)))
    }
}

fn to_param(value: &Value) -> Box<dyn ToSql + Sync> {
    match value {
        Value::Null => Box::new(Option::<String>::None),
        Value::Bool(b) => Box::new(*b),
        Value::Integer(i) => Box::new(*i),
        Value::Real(f) => Box::new(*f),
        Value::Text(s) => Box::new(s.clone()),
        Value::Date(d) => Box::new(*d),
    }
}

fn convert_row(row: &Row) -> Result<Vec<Value>> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| convert_cell(row, i, column.type_(), column.name()))
        .collect()
}

fn convert_cell(row: &Row, index: usize, ty: &Type, column: &str) -> Result<Value> {
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(index)?.map(Value::Bool)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(index)?.map(|v| Value::Integer(v.into()))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(index)?.map(|v| Value::Integer(v.into()))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(index)?.map(Value::Integer)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(index)?.map(|v| Value::Real(v.into()))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(index)?.map(Value::Real)
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME {
        row.try_get::<_, Option<String>>(index)?.map(Value::Text)
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(index)?.map(Value::Date)
    } else {
        return Err(EtlError::Query(format!(
            "column {} has unsupported type {}",
            column, ty
        )));
    };
    Ok(value.unwrap_or(Value::Null))
}
