//! Stored-procedure mapping layer.
//!
//! Executes named procedures through a [`dal::DataAccess`] collaborator and
//! converts result rows into typed records, and records into column maps,
//! through cached per-type field tables.

pub mod config;
pub mod dal;
pub mod error;
pub mod logging;
pub mod mapper;
pub mod model;
pub mod service;

pub use config::{ConfigError, EntitierConfig, LoggingConfig, ServiceConfig, SqliteConfig};
pub use dal::{DalError, DalResult, DataAccess, SqliteDataAccess, TransactionHandle};
pub use error::{ServiceError, ServiceResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use mapper::{
    to_column_map, ConversionError, Field, FieldTable, FromValue, MapError, MapResult, Mapper,
    Projection, Record, ToValue,
};
pub use model::argument::{Argument, Direction, SqlType};
pub use model::value::{ColumnMap, Value};
pub use service::{ExecuteOptions, ProcedureService};

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
