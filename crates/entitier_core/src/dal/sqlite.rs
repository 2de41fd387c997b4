//! SQLite-backed data access collaborator.
//!
//! # Responsibility
//! - Run registered named SQL statements as procedures.
//! - Bind pending parameters by name and report outcome metadata.
//! - Own the connection and the optional explicit transaction.
//!
//! # Invariants
//! - Returned connections have `foreign_keys` and busy timeout configured.
//! - Foreign-key violations are reported through `return_value`, not raised.
//! - Every execute/read call consumes the bound parameters, success or not.
//! - A generated id is reported only for statements that inserted rows.
//! - Replacing the connection ends any open transaction first.
//! - Nothing is usable after `dispose`.

use super::{DalError, DalResult, DataAccess};
use crate::config::SqliteConfig;
use crate::mapper::{ConversionError, FromValue, ToValue};
use crate::model::argument::{Argument, Direction, SqlType};
use crate::model::value::{ColumnMap, Value};
use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{ffi, Connection, Statement};
use std::borrow::Cow;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Extended result code SQLite reports for a foreign-key constraint failure.
pub const FOREIGN_KEY_VIOLATION_CODE: &str = "787";

static PROCEDURE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("valid procedure name regex")
});

static INSERT_STATEMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*(?:WITH\b.*?\)\s*)?(?:INSERT|REPLACE)\b")
        .expect("valid insert statement regex")
});

/// Explicit transaction opened by `execute_with_transaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionHandle {
    id: Uuid,
    started_at: Instant,
}

impl TransactionHandle {
    fn begin() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// `DataAccess` implementation over one `rusqlite::Connection`.
pub struct SqliteDataAccess {
    config: SqliteConfig,
    procedures: HashMap<String, String>,
    conn: Option<Connection>,
    transaction: Option<TransactionHandle>,
    parameters: Vec<Argument>,
    rows_affected: i64,
    id: Value,
    return_value: String,
    scalar_value: Value,
    id_return_name: String,
    disposed: bool,
}

impl SqliteDataAccess {
    /// Creates a disconnected collaborator and registers configured procedures.
    ///
    /// # Errors
    /// - `DalError::InvalidProcedureName` for a malformed procedure name.
    pub fn new(mut config: SqliteConfig) -> DalResult<Self> {
        let procedures = std::mem::take(&mut config.procedures);
        let mut data = Self::disconnected(config);
        for (name, sql) in procedures {
            data.register_procedure(name, sql)?;
        }
        Ok(data)
    }

    /// Creates a disconnected collaborator for an in-memory database.
    pub fn in_memory() -> Self {
        Self::disconnected(SqliteConfig::default())
    }

    fn disconnected(config: SqliteConfig) -> Self {
        Self {
            config,
            procedures: HashMap::new(),
            conn: None,
            transaction: None,
            parameters: Vec::new(),
            rows_affected: 0,
            id: Value::Null,
            return_value: String::new(),
            scalar_value: Value::Null,
            id_return_name: String::new(),
            disposed: false,
        }
    }

    /// Registers (or replaces) a named SQL statement.
    pub fn register_procedure(
        &mut self,
        name: impl Into<String>,
        sql: impl Into<String>,
    ) -> DalResult<()> {
        let name = name.into();
        validate_procedure_name(&name)?;
        self.procedures.insert(name, sql.into());
        Ok(())
    }

    pub fn has_procedure(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    fn ensure_usable(&self) -> DalResult<()> {
        if self.disposed {
            return Err(DalError::Disposed);
        }
        Ok(())
    }

    fn procedure_sql(&self, procedure: &str) -> DalResult<String> {
        validate_procedure_name(procedure)?;
        self.procedures
            .get(procedure)
            .cloned()
            .ok_or_else(|| DalError::UnknownProcedure(procedure.to_string()))
    }

    fn reset_outcome(&mut self) {
        self.rows_affected = 0;
        self.id = Value::Null;
        self.return_value.clear();
        self.scalar_value = Value::Null;
    }

    fn run(&mut self, procedure: &str, scalar: bool, parameters: Vec<Argument>) -> DalResult<()> {
        self.ensure_usable()?;
        self.reset_outcome();
        let sql = self.procedure_sql(procedure)?;
        let conn = self.conn.as_ref().ok_or(DalError::NotConnected)?;

        let mut stmt = conn.prepare(&sql)?;
        bind_parameters(procedure, &mut stmt, &parameters)?;

        if scalar {
            let mut rows = stmt.raw_query();
            self.scalar_value = match rows.next()? {
                Some(row) => value_from_sql(row.get_ref(0)?),
                None => Value::Null,
            };
            return Ok(());
        }

        let id_column = id_column_name(&self.id_return_name);
        let outcome = if stmt.column_count() > 0 {
            execute_returning(conn, &mut stmt, id_column)
        } else {
            stmt.raw_execute().map(|changes| {
                let changes = i64::try_from(changes).unwrap_or(i64::MAX);
                let inserted = changes > 0 && INSERT_STATEMENT_RE.is_match(&sql);
                let id = if inserted && !id_column.is_empty() {
                    Value::Integer(conn.last_insert_rowid())
                } else {
                    Value::Null
                };
                (changes, id)
            })
        };

        match outcome {
            Ok((changes, id)) => {
                self.rows_affected = changes;
                self.id = id;
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(failure, message))
                if failure.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                warn!(
                    "event=dal_execute module=dal status=constraint procedure={} error_code={} error={}",
                    procedure,
                    failure.extended_code,
                    message.as_deref().unwrap_or("foreign key constraint failed")
                );
                self.return_value = failure.extended_code.to_string();
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn query(
        &mut self,
        procedure: &str,
        expected: &ColumnMap,
        limit: Option<usize>,
    ) -> DalResult<Vec<ColumnMap>> {
        let parameters = std::mem::take(&mut self.parameters);
        self.ensure_usable()?;
        self.reset_outcome();
        let sql = self.procedure_sql(procedure)?;
        let conn = self.conn.as_ref().ok_or(DalError::NotConnected)?;

        let mut stmt = conn.prepare(&sql)?;
        bind_parameters(procedure, &mut stmt, &parameters)?;

        let column_count = stmt.column_count();
        let selected: Vec<(usize, String)> = stmt
            .column_names()
            .into_iter()
            .enumerate()
            .filter(|(_, name)| expected.is_empty() || expected.contains_key(*name))
            .map(|(index, name)| (index, name.to_string()))
            .collect();
        if selected.len() < column_count {
            debug!(
                "event=dal_read module=dal status=filtered procedure={} columns={} dropped={}",
                procedure,
                column_count,
                column_count - selected.len()
            );
        }

        let mut maps = Vec::new();
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let mut map = ColumnMap::with_capacity(selected.len());
            for (index, name) in &selected {
                map.insert(name.clone(), value_from_sql(row.get_ref(*index)?));
            }
            maps.push(map);
            if limit.is_some_and(|limit| maps.len() >= limit) {
                break;
            }
        }
        drop(rows);
        drop(stmt);

        self.rows_affected = i64::try_from(maps.len()).unwrap_or(i64::MAX);
        Ok(maps)
    }

    fn open_connection(&self) -> DalResult<Connection> {
        let started_at = Instant::now();
        let mode = if self.config.path.is_some() {
            "file"
        } else {
            "memory"
        };
        info!("event=dal_connect module=dal status=start mode={mode}");

        let opened = match &self.config.path {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        };
        let conn = match opened {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=dal_connect module=dal status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };

        match bootstrap_connection(&conn, &self.config) {
            Ok(()) => {
                info!(
                    "event=dal_connect module=dal status=ok mode={} duration_ms={}",
                    mode,
                    started_at.elapsed().as_millis()
                );
                Ok(conn)
            }
            Err(err) => {
                error!(
                    "event=dal_connect module=dal status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn rollback_open_transaction(&mut self) -> DalResult<()> {
        let Some(handle) = self.transaction.take() else {
            return Ok(());
        };
        if let Some(conn) = self.conn.as_ref() {
            warn!(
                "event=dal_transaction module=dal status=rollback reason=close transaction_id={}",
                handle.id()
            );
            conn.execute_batch("ROLLBACK;")?;
        }
        Ok(())
    }

    fn close_connection(&mut self) -> DalResult<()> {
        let rollback = self.rollback_open_transaction();
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| err)?;
            info!("event=dal_disconnect module=dal status=ok");
        }
        rollback
    }
}

impl DataAccess for SqliteDataAccess {
    type Connection = Connection;
    type Transaction = TransactionHandle;

    fn connect(&mut self) -> DalResult<()> {
        self.ensure_usable()?;
        if self.conn.is_some() {
            return Ok(());
        }
        self.conn = Some(self.open_connection()?);
        Ok(())
    }

    fn disconnect(&mut self) -> DalResult<()> {
        self.ensure_usable()?;
        self.close_connection()
    }

    fn connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    fn set_connection(&mut self, connection: Option<Connection>) {
        if let Err(err) = self.rollback_open_transaction() {
            warn!(
                "event=dal_transaction module=dal status=error reason=connection_replaced error={}",
                err
            );
        }
        self.conn = connection;
    }

    fn transaction(&self) -> Option<&TransactionHandle> {
        self.transaction.as_ref()
    }

    fn set_transaction(&mut self, transaction: Option<TransactionHandle>) {
        self.transaction = transaction;
    }

    fn add_parameter(&mut self, name: &str, value: Value, sql_type: SqlType, direction: Direction) {
        self.parameters.push(Argument {
            name: name.to_string(),
            value,
            sql_type,
            direction,
        });
    }

    fn execute(&mut self, procedure: &str, scalar: bool) -> DalResult<()> {
        let parameters = std::mem::take(&mut self.parameters);
        self.run(procedure, scalar, parameters)
    }

    fn execute_with_transaction(&mut self, procedure: &str) -> DalResult<()> {
        let parameters = std::mem::take(&mut self.parameters);
        self.ensure_usable()?;
        if self.transaction.is_none() {
            let conn = self.conn.as_ref().ok_or(DalError::NotConnected)?;
            conn.execute_batch("BEGIN IMMEDIATE;")?;
            let handle = TransactionHandle::begin();
            info!(
                "event=dal_transaction module=dal status=begin transaction_id={}",
                handle.id()
            );
            self.transaction = Some(handle);
        }
        self.run(procedure, false, parameters)
    }

    fn transaction_finish(&mut self, commit: bool) -> DalResult<()> {
        self.ensure_usable()?;
        let conn = self.conn.as_ref().ok_or(DalError::NotConnected)?;
        let handle = self
            .transaction
            .take()
            .ok_or(DalError::NoActiveTransaction)?;
        conn.execute_batch(if commit { "COMMIT;" } else { "ROLLBACK;" })?;
        info!(
            "event=dal_transaction module=dal status={} transaction_id={} duration_ms={}",
            if commit { "commit" } else { "rollback" },
            handle.id(),
            handle.elapsed().as_millis()
        );
        Ok(())
    }

    fn read(&mut self, procedure: &str, expected: &ColumnMap) -> DalResult<Option<ColumnMap>> {
        Ok(self.query(procedure, expected, Some(1))?.into_iter().next())
    }

    fn read_list(&mut self, procedure: &str, expected: &ColumnMap) -> DalResult<Vec<ColumnMap>> {
        self.query(procedure, expected, None)
    }

    fn rows_affected(&self) -> i64 {
        self.rows_affected
    }

    fn id(&self) -> &Value {
        &self.id
    }

    fn return_value(&self) -> &str {
        &self.return_value
    }

    fn scalar_value(&self) -> &Value {
        &self.scalar_value
    }

    fn id_return_name(&self) -> &str {
        &self.id_return_name
    }

    fn set_id_return_name(&mut self, name: &str) {
        self.id_return_name = name.to_string();
    }

    fn dispose(&mut self) -> DalResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        self.parameters.clear();
        self.close_connection()
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(flag) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*flag))),
            Value::Integer(number) => ToSqlOutput::Owned(SqlValue::Integer(*number)),
            Value::Real(number) => ToSqlOutput::Owned(SqlValue::Real(*number)),
            Value::Text(text) => ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes())),
            Value::Blob(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes)),
        })
    }
}

fn value_from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(number) => Value::Integer(number),
        ValueRef::Real(number) => Value::Real(number),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

fn validate_procedure_name(name: &str) -> DalResult<()> {
    if PROCEDURE_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(DalError::InvalidProcedureName(name.to_string()))
    }
}

fn bootstrap_connection(conn: &Connection, config: &SqliteConfig) -> DalResult<()> {
    let foreign_keys = if config.foreign_keys { "ON" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA foreign_keys = {foreign_keys};"))?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    Ok(())
}

/// Column holding the generated id; a leading parameter prefix is ignored.
fn id_column_name(id_return_name: &str) -> &str {
    id_return_name.trim_start_matches([':', '@', '$'])
}

/// Runs a statement that yields rows (`INSERT .. RETURNING`) and takes the
/// generated id from the first row's `id_column`, when present.
fn execute_returning(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    id_column: &str,
) -> rusqlite::Result<(i64, Value)> {
    let id_index = if id_column.is_empty() {
        None
    } else {
        stmt.column_names()
            .iter()
            .position(|name| name.eq_ignore_ascii_case(id_column))
    };
    let readonly = stmt.readonly();

    let mut id = Value::Null;
    let mut first = true;
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        if first {
            if let Some(index) = id_index {
                id = value_from_sql(row.get_ref(index)?);
            }
            first = false;
        }
    }
    drop(rows);

    let changes = if readonly {
        0
    } else {
        i64::try_from(conn.changes()).unwrap_or(i64::MAX)
    };
    Ok((changes, id))
}

/// Parameter names without a SQLite prefix are bound as `@name`.
fn placeholder_name(name: &str) -> Cow<'_, str> {
    if name.starts_with([':', '@', '$']) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("@{name}"))
    }
}

fn bind_parameters(
    procedure: &str,
    stmt: &mut Statement<'_>,
    parameters: &[Argument],
) -> DalResult<()> {
    for parameter in parameters.iter().filter(|item| item.direction.is_bound()) {
        let placeholder = placeholder_name(&parameter.name);
        let index = stmt
            .parameter_index(&placeholder)?
            .ok_or_else(|| DalError::UnknownParameter {
                procedure: procedure.to_string(),
                parameter: parameter.name.clone(),
            })?;
        let value = coerce_for_binding(&parameter.value, parameter.sql_type).map_err(|source| {
            DalError::Conversion {
                parameter: parameter.name.clone(),
                source,
            }
        })?;
        stmt.raw_bind_parameter(index, value)?;
    }
    Ok(())
}

fn coerce_for_binding(value: &Value, sql_type: SqlType) -> Result<Value, ConversionError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    Ok(match sql_type {
        SqlType::BigInt => Value::Integer(i64::from_value(value)?),
        SqlType::Int => Value::Integer(i64::from(i32::from_value(value)?)),
        SqlType::SmallInt => Value::Integer(i64::from(i16::from_value(value)?)),
        SqlType::TinyInt => Value::Integer(i64::from(u8::from_value(value)?)),
        SqlType::Bit => Value::Bool(bool::from_value(value)?),
        SqlType::Decimal | SqlType::Float | SqlType::Real => Value::Real(f64::from_value(value)?),
        SqlType::Char
        | SqlType::VarChar
        | SqlType::NVarChar
        | SqlType::Text
        | SqlType::Date
        | SqlType::DateTime => Value::Text(String::from_value(value)?),
        SqlType::UniqueIdentifier => Uuid::from_value(value)?.to_value(),
        SqlType::Binary | SqlType::VarBinary => Value::Blob(Vec::<u8>::from_value(value)?),
    })
}
