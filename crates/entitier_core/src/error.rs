//! Procedure service error taxonomy.
//!
//! # Responsibility
//! - Classify failures surfaced by `ProcedureService` operations.
//! - Hold the user-facing message constants.
//!
//! # Invariants
//! - Collaborator failures are wrapped unchanged in `ServiceError::DataAccess`.
//! - `InvalidArgument` is always raised before any collaborator call.

use crate::dal::DalError;
use crate::mapper::MapError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// User-facing messages.
pub mod messages {
    pub const MUST_PROVIDE_NAME: &str = "a parameter name must be provided";
    pub const MUST_PROVIDE_PROCEDURE: &str = "a stored procedure name must be provided";
    pub const CANT_DELETE_REFERENCED_DATA: &str =
        "cannot delete data referenced by other tables";
    pub const ROWS_NOT_AFFECTED: &str = "no rows were affected";
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    /// Empty procedure or parameter name.
    InvalidArgument(&'static str),
    /// The collaborator reported the configured referential-integrity code.
    ReferentialIntegrityViolation { procedure: String },
    /// Strict execute affected zero rows.
    NoRowsAffected { procedure: String },
    /// A column value did not fit its property.
    Conversion(MapError),
    /// Any other collaborator failure, passed through untouched.
    DataAccess(DalError),
}

impl ServiceError {
    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::ReferentialIntegrityViolation { .. } => "referential_integrity",
            Self::NoRowsAffected { .. } => "no_rows_affected",
            Self::Conversion(_) => "conversion_failed",
            Self::DataAccess(_) => "data_access_failed",
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "{message}"),
            Self::ReferentialIntegrityViolation { procedure } => write!(
                f,
                "{}: {procedure}",
                messages::CANT_DELETE_REFERENCED_DATA
            ),
            Self::NoRowsAffected { procedure } => {
                write!(f, "{}: {procedure}", messages::ROWS_NOT_AFFECTED)
            }
            Self::Conversion(err) => write!(f, "{err}"),
            Self::DataAccess(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Conversion(err) => Some(err),
            Self::DataAccess(err) => Some(err),
            Self::InvalidArgument(_)
            | Self::ReferentialIntegrityViolation { .. }
            | Self::NoRowsAffected { .. } => None,
        }
    }
}

impl From<MapError> for ServiceError {
    fn from(value: MapError) -> Self {
        Self::Conversion(value)
    }
}

impl From<DalError> for ServiceError {
    fn from(value: DalError) -> Self {
        Self::DataAccess(value)
    }
}
