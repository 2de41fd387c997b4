//! Record <-> column map projection.
//!
//! # Responsibility
//! - Project a record's readable properties into a fresh column map.
//! - Build a record from a column map with type coercion.
//! - Re-project one record type into another through shared names.
//!
//! # Invariants
//! - A NULL or empty column value always assigns "no value", never a
//!   coerced default such as zero or an empty string.
//! - Unknown or read-only columns are skipped under `Projection::Tolerant`
//!   and rejected under `Projection::Strict`.

mod convert;
mod record;

pub use convert::{ConversionError, FromValue, ToValue};
pub use record::{Field, FieldTable, Getter, Record, Setter};

use crate::model::value::{ColumnMap, Value};
use log::trace;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type MapResult<T> = Result<T, MapError>;

/// Mapping failure for one column map -> record projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    /// A column value could not be coerced into its property type.
    Conversion {
        column: String,
        source: ConversionError,
    },
    /// Strict projection found a column without a matching property.
    UnknownColumn(String),
    /// Strict projection found a column whose property has no setter.
    ReadOnlyColumn(String),
}

impl Display for MapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conversion { column, source } => write!(f, "column `{column}`: {source}"),
            Self::UnknownColumn(column) => write!(f, "column `{column}` has no matching property"),
            Self::ReadOnlyColumn(column) => write!(f, "property for column `{column}` is read-only"),
        }
    }
}

impl Error for MapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Conversion { source, .. } => Some(source),
            Self::UnknownColumn(_) | Self::ReadOnlyColumn(_) => None,
        }
    }
}

/// Policy for columns that have no writable property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// Skip unmatched columns silently.
    #[default]
    Tolerant,
    /// Fail on the first unmatched column.
    Strict,
}

/// Column map projection engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mapper {
    projection: Projection,
}

impl Mapper {
    pub fn new(projection: Projection) -> Self {
        Self { projection }
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Builds a default `T` and assigns every matching column.
    ///
    /// # Errors
    /// - `MapError::Conversion` when a value cannot be coerced, including NULL
    ///   reaching a non-optional property.
    /// - `MapError::UnknownColumn` / `MapError::ReadOnlyColumn` in strict mode.
    pub fn from_column_map<T: Record>(&self, columns: &ColumnMap) -> MapResult<T> {
        let table = T::field_table();
        let mut record = T::default();

        for (column, raw) in columns {
            let Some(field) = table.get(column) else {
                if self.projection == Projection::Strict {
                    return Err(MapError::UnknownColumn(column.clone()));
                }
                trace!("event=map_skip module=mapper reason=unknown_column column={column}");
                continue;
            };

            let value = if raw.is_null_or_empty() {
                &Value::Null
            } else {
                raw
            };

            match field.write(&mut record, value) {
                Some(result) => result.map_err(|source| MapError::Conversion {
                    column: column.clone(),
                    source,
                })?,
                None if self.projection == Projection::Strict => {
                    return Err(MapError::ReadOnlyColumn(column.clone()));
                }
                None => {
                    trace!("event=map_skip module=mapper reason=read_only column={column}");
                }
            }
        }

        Ok(record)
    }

    /// Copies shared properties of `source` into a fresh `T`.
    ///
    /// A missing source yields `T::default()`.
    pub fn pass_to_class<S: Record, T: Record>(&self, source: Option<&S>) -> MapResult<T> {
        self.from_column_map(&to_column_map(source))
    }
}

/// Copies every readable property of `record` into a fresh column map.
///
/// A missing record yields an empty map.
pub fn to_column_map<T: Record>(record: Option<&T>) -> ColumnMap {
    let Some(record) = record else {
        return ColumnMap::new();
    };

    T::field_table()
        .iter()
        .filter_map(|field| {
            field
                .read(record)
                .map(|value| (field.name().to_string(), value))
        })
        .collect()
}
