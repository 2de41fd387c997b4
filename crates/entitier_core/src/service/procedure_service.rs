//! Stored-procedure façade.
//!
//! # Responsibility
//! - Accumulate pending arguments and flush them before each call.
//! - Drive the data access collaborator for execute/read/read-list/scalar.
//! - Map result rows into typed records.
//!
//! # Invariants
//! - Pending arguments are flushed exactly once per call, in insertion order,
//!   and never partially.
//! - The collaborator's id-return name is set only for the duration of an
//!   execute and cleared on every exit path.
//! - The collaborator is disposed at most once.

use crate::config::ServiceConfig;
use crate::dal::DataAccess;
use crate::error::{messages, ServiceError, ServiceResult};
use crate::mapper::{to_column_map, FromValue, MapError, Mapper, Record};
use crate::model::argument::{Argument, Direction, SqlType};
use crate::model::value::Value;
use log::{debug, info, warn};
use std::ops::{Deref, DerefMut};
use std::time::Instant;

/// Options for `ProcedureService::execute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Run inside the collaborator's active transaction.
    pub transactional: bool,
    /// Store a positive generated id in `ProcedureService::id`.
    pub return_generated_id: bool,
    /// Fail with `NoRowsAffected` when nothing changed.
    pub fail_if_no_rows_affected: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            transactional: false,
            return_generated_id: false,
            fail_if_no_rows_affected: true,
        }
    }
}

/// Maps typed records onto stored-procedure calls.
///
/// One instance per unit of work. The pending argument list and the
/// collaborator's connection state are unsynchronized; wrap the service in a
/// `Mutex` if it must cross threads.
pub struct ProcedureService<D: DataAccess> {
    data: D,
    parameters: Vec<Argument>,
    rows_found: bool,
    id: Option<i64>,
    config: ServiceConfig,
    mapper: Mapper,
    disposed: bool,
}

impl<D: DataAccess> ProcedureService<D> {
    /// Creates a service with default configuration.
    pub fn new(data: D) -> Self {
        Self::with_config(data, ServiceConfig::default())
    }

    pub fn with_config(data: D, config: ServiceConfig) -> Self {
        Self {
            data,
            parameters: Vec::new(),
            rows_found: false,
            id: None,
            mapper: Mapper::new(config.projection),
            config,
            disposed: false,
        }
    }

    /// Whether the last `get`/`get_list` produced at least one record.
    pub fn rows_found(&self) -> bool {
        self.rows_found
    }

    /// Last generated id stored by an execute that requested it.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn id_return_name(&self) -> &str {
        &self.config.id_return_name
    }

    pub fn set_id_return_name(&mut self, name: impl Into<String>) {
        self.config.id_return_name = name.into();
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Arguments waiting for the next call.
    pub fn pending_arguments(&self) -> &[Argument] {
        &self.parameters
    }

    pub fn data_access(&self) -> &D {
        &self.data
    }

    pub fn data_access_mut(&mut self) -> &mut D {
        &mut self.data
    }

    pub fn connect(&mut self) -> ServiceResult<()> {
        Ok(self.data.connect()?)
    }

    pub fn disconnect(&mut self) -> ServiceResult<()> {
        Ok(self.data.disconnect()?)
    }

    pub fn connection(&self) -> Option<&D::Connection> {
        self.data.connection()
    }

    pub fn set_connection(&mut self, connection: Option<D::Connection>) {
        self.data.set_connection(connection);
    }

    pub fn transaction(&self) -> Option<&D::Transaction> {
        self.data.transaction()
    }

    pub fn set_transaction(&mut self, transaction: Option<D::Transaction>) {
        self.data.set_transaction(transaction);
    }

    /// Commits (`true`) or rolls back (`false`) the collaborator's transaction.
    pub fn transaction_finish(&mut self, commit: bool) -> ServiceResult<()> {
        Ok(self.data.transaction_finish(commit)?)
    }

    /// Queues an input argument for the next call.
    pub fn parameter_add(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        sql_type: SqlType,
    ) -> ServiceResult<()> {
        self.parameter_add_with_direction(name, value, sql_type, Direction::Input)
    }

    /// Queues an argument with an explicit direction.
    ///
    /// Repeated names are kept; the collaborator resolves conflicts.
    ///
    /// # Errors
    /// - `ServiceError::InvalidArgument` when `name` is empty.
    pub fn parameter_add_with_direction(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        sql_type: SqlType,
        direction: Direction,
    ) -> ServiceResult<()> {
        let argument = Argument::new(name, value, sql_type, direction)
            .ok_or(ServiceError::InvalidArgument(messages::MUST_PROVIDE_NAME))?;
        self.parameters.push(argument);
        Ok(())
    }

    /// Runs a procedure that changes data.
    ///
    /// # Errors
    /// - `InvalidArgument` for an empty procedure name.
    /// - `ReferentialIntegrityViolation` when the collaborator reports the
    ///   configured referential-integrity code.
    /// - `NoRowsAffected` when nothing changed and the options are strict.
    /// - `DataAccess` for any collaborator failure.
    pub fn execute(&mut self, procedure: &str, options: ExecuteOptions) -> ServiceResult<()> {
        require_procedure(procedure)?;
        let started_at = Instant::now();
        let result = self.execute_inner(procedure, options);
        log_call("procedure_execute", procedure, started_at, &result);
        result
    }

    /// Reads at most one row into a `T`.
    pub fn get<T: Record>(&mut self, procedure: &str) -> ServiceResult<Option<T>> {
        require_procedure(procedure)?;
        let started_at = Instant::now();
        self.rows_found = false;
        self.flush_parameters();
        let expected = to_column_map(Some(&T::default()));
        let result = self
            .data
            .read(procedure, &expected)
            .map_err(ServiceError::from)
            .and_then(|row| {
                row.map(|columns| self.mapper.from_column_map::<T>(&columns))
                    .transpose()
                    .map_err(ServiceError::from)
            });
        if let Ok(record) = &result {
            self.rows_found = record.is_some();
        }
        log_call("procedure_read", procedure, started_at, &result);
        result
    }

    /// Reads every row into a `T`, preserving result-set order.
    pub fn get_list<T: Record>(&mut self, procedure: &str) -> ServiceResult<Vec<T>> {
        require_procedure(procedure)?;
        let started_at = Instant::now();
        self.rows_found = false;
        self.flush_parameters();
        let expected = to_column_map(Some(&T::default()));
        let result = self
            .data
            .read_list(procedure, &expected)
            .map_err(ServiceError::from)
            .and_then(|rows| {
                rows.iter()
                    .map(|columns| self.mapper.from_column_map::<T>(columns))
                    .collect::<Result<Vec<T>, MapError>>()
                    .map_err(ServiceError::from)
            });
        if let Ok(records) = &result {
            self.rows_found = !records.is_empty();
        }
        log_call("procedure_read_list", procedure, started_at, &result);
        result
    }

    /// Runs a procedure for one raw value; database NULL becomes `None`.
    pub fn scalar(&mut self, procedure: &str) -> ServiceResult<Option<Value>> {
        require_procedure(procedure)?;
        let started_at = Instant::now();
        self.flush_parameters();
        let result = self
            .data
            .execute(procedure, true)
            .map(|()| match self.data.scalar_value() {
                Value::Null => None,
                value => Some(value.clone()),
            })
            .map_err(ServiceError::from);
        log_call("procedure_scalar", procedure, started_at, &result);
        result
    }

    /// Re-projects `source` into a fresh `T` through shared property names.
    pub fn pass_to_class<S: Record, T: Record>(&self, source: Option<&S>) -> ServiceResult<T> {
        Ok(self.mapper.pass_to_class(source)?)
    }

    /// Releases the collaborator. Later calls are no-ops.
    pub fn dispose(&mut self) -> ServiceResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        self.parameters.clear();
        self.data.dispose()?;
        info!("event=service_dispose module=service status=ok");
        Ok(())
    }

    fn execute_inner(&mut self, procedure: &str, options: ExecuteOptions) -> ServiceResult<()> {
        self.flush_parameters();
        {
            let mut data = IdReturnScope::enter(&mut self.data, &self.config.id_return_name);
            if options.transactional {
                data.execute_with_transaction(procedure)?;
            } else {
                data.execute(procedure, false)?;
            }
        }

        let code = self.config.referential_integrity_code.as_str();
        if !code.is_empty() && self.data.return_value() == code {
            return Err(ServiceError::ReferentialIntegrityViolation {
                procedure: procedure.to_string(),
            });
        }

        if self.data.rows_affected() <= 0 && options.fail_if_no_rows_affected {
            return Err(ServiceError::NoRowsAffected {
                procedure: procedure.to_string(),
            });
        }

        if options.return_generated_id {
            let generated = Option::<i64>::from_value(self.data.id()).map_err(|source| {
                MapError::Conversion {
                    column: self.config.id_return_name.clone(),
                    source,
                }
            })?;
            if let Some(id) = generated.filter(|id| *id > 0) {
                self.id = Some(id);
            }
        }

        Ok(())
    }

    fn flush_parameters(&mut self) {
        if self.parameters.is_empty() {
            return;
        }
        for argument in self.parameters.drain(..) {
            self.data.add_parameter(
                &argument.name,
                argument.value,
                argument.sql_type,
                argument.direction,
            );
        }
    }
}

impl<D: DataAccess> Drop for ProcedureService<D> {
    fn drop(&mut self) {
        if self.disposed {
            return;
        }
        if let Err(err) = self.dispose() {
            warn!(
                "event=service_dispose module=service status=error trigger=drop error_code={} error={}",
                err.code(),
                err
            );
        }
    }
}

/// Sets the collaborator's id-return name and clears it when dropped.
struct IdReturnScope<'a, D: DataAccess> {
    data: &'a mut D,
}

impl<'a, D: DataAccess> IdReturnScope<'a, D> {
    fn enter(data: &'a mut D, name: &str) -> Self {
        data.set_id_return_name(name);
        Self { data }
    }
}

impl<D: DataAccess> Deref for IdReturnScope<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.data
    }
}

impl<D: DataAccess> DerefMut for IdReturnScope<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.data
    }
}

impl<D: DataAccess> Drop for IdReturnScope<'_, D> {
    fn drop(&mut self) {
        self.data.set_id_return_name("");
    }
}

fn require_procedure(procedure: &str) -> ServiceResult<()> {
    if procedure.is_empty() {
        return Err(ServiceError::InvalidArgument(
            messages::MUST_PROVIDE_PROCEDURE,
        ));
    }
    Ok(())
}

fn log_call<T>(event: &str, procedure: &str, started_at: Instant, result: &ServiceResult<T>) {
    match result {
        Ok(_) => debug!(
            "event={} module=service status=ok procedure={} duration_ms={}",
            event,
            procedure,
            started_at.elapsed().as_millis()
        ),
        Err(err) => warn!(
            "event={} module=service status=error procedure={} duration_ms={} error_code={} error={}",
            event,
            procedure,
            started_at.elapsed().as_millis(),
            err.code(),
            err
        ),
    }
}
