//! Data access collaborator contract.
//!
//! # Responsibility
//! - Define the narrow interface the procedure service drives: connection
//!   lifecycle, parameter binding, execution, reads and outcome metadata.
//! - Provide the shared collaborator error type.
//!
//! # Invariants
//! - Bound parameters are consumed by the next execute/read call.
//! - Outcome metadata reflects only the most recent execute/read call.
//!
//! # See also
//! - `dal::sqlite` for the bundled SQLite implementation.

use crate::mapper::ConversionError;
use crate::model::argument::{Direction, SqlType};
use crate::model::value::{ColumnMap, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite;

pub use sqlite::{SqliteDataAccess, TransactionHandle};

pub type DalResult<T> = Result<T, DalError>;

/// Failure raised by a data access collaborator.
#[derive(Debug)]
pub enum DalError {
    Sqlite(rusqlite::Error),
    NotConnected,
    Disposed,
    InvalidProcedureName(String),
    UnknownProcedure(String),
    UnknownParameter { procedure: String, parameter: String },
    NoActiveTransaction,
    Conversion {
        parameter: String,
        source: ConversionError,
    },
    /// Failure from a collaborator backed by something other than SQLite.
    Backend(Box<dyn Error + Send + Sync>),
}

impl Display for DalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::NotConnected => write!(f, "data access is not connected"),
            Self::Disposed => write!(f, "data access has been disposed"),
            Self::InvalidProcedureName(name) => write!(f, "invalid procedure name `{name}`"),
            Self::UnknownProcedure(name) => write!(f, "procedure not registered: {name}"),
            Self::UnknownParameter {
                procedure,
                parameter,
            } => write!(
                f,
                "procedure `{procedure}` has no parameter named `{parameter}`"
            ),
            Self::NoActiveTransaction => write!(f, "no active transaction"),
            Self::Conversion { parameter, source } => {
                write!(f, "parameter `{parameter}`: {source}")
            }
            Self::Backend(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Conversion { source, .. } => Some(source),
            Self::Backend(err) => Some(err.as_ref()),
            Self::NotConnected
            | Self::Disposed
            | Self::InvalidProcedureName(_)
            | Self::UnknownProcedure(_)
            | Self::UnknownParameter { .. }
            | Self::NoActiveTransaction => None,
        }
    }
}

impl From<rusqlite::Error> for DalError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Executes named procedures and exposes their outcome.
///
/// Implementations are synchronous and blocking; timeouts and cancellation are
/// theirs to configure.
pub trait DataAccess {
    /// Opaque connection handle exposed for pass-through access.
    type Connection;
    /// Opaque transaction handle exposed for pass-through access.
    type Transaction;

    fn connect(&mut self) -> DalResult<()>;
    fn disconnect(&mut self) -> DalResult<()>;

    fn connection(&self) -> Option<&Self::Connection>;
    fn set_connection(&mut self, connection: Option<Self::Connection>);
    fn transaction(&self) -> Option<&Self::Transaction>;
    fn set_transaction(&mut self, transaction: Option<Self::Transaction>);

    /// Binds one parameter for the next execution.
    fn add_parameter(&mut self, name: &str, value: Value, sql_type: SqlType, direction: Direction);

    /// Runs a procedure; `scalar` selects whether a scalar result is expected.
    fn execute(&mut self, procedure: &str, scalar: bool) -> DalResult<()>;
    /// Runs a procedure inside the active transaction, starting one if needed.
    fn execute_with_transaction(&mut self, procedure: &str) -> DalResult<()>;
    /// Commits (`true`) or rolls back (`false`) the active transaction.
    fn transaction_finish(&mut self, commit: bool) -> DalResult<()>;

    /// Reads at most one row.
    fn read(&mut self, procedure: &str, expected: &ColumnMap) -> DalResult<Option<ColumnMap>>;
    /// Reads every row in result-set order.
    fn read_list(&mut self, procedure: &str, expected: &ColumnMap) -> DalResult<Vec<ColumnMap>>;

    fn rows_affected(&self) -> i64;
    /// Generated identifier of the last execution, NULL when none.
    fn id(&self) -> &Value;
    /// Database error code of the last execution as text, empty when none.
    fn return_value(&self) -> &str;
    /// Scalar result of the last scalar execution.
    fn scalar_value(&self) -> &Value;

    fn id_return_name(&self) -> &str;
    fn set_id_return_name(&mut self, name: &str);

    /// Releases underlying resources.
    fn dispose(&mut self) -> DalResult<()>;
}
