//! Pending procedure argument.
//!
//! # Responsibility
//! - Describe one parameter bound to the next procedure call.
//!
//! # Invariants
//! - `name` is never empty once constructed through `Argument::new`.
//! - Arguments live for one execution only; they are never persisted.

use super::value::Value;
use serde::{Deserialize, Serialize};

/// Database-side parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    BigInt,
    Int,
    SmallInt,
    TinyInt,
    Bit,
    Decimal,
    Float,
    Real,
    Char,
    VarChar,
    NVarChar,
    Text,
    Date,
    DateTime,
    UniqueIdentifier,
    Binary,
    VarBinary,
}

impl SqlType {
    /// Stable lower-case label used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BigInt => "bigint",
            Self::Int => "int",
            Self::SmallInt => "smallint",
            Self::TinyInt => "tinyint",
            Self::Bit => "bit",
            Self::Decimal => "decimal",
            Self::Float => "float",
            Self::Real => "real",
            Self::Char => "char",
            Self::VarChar => "varchar",
            Self::NVarChar => "nvarchar",
            Self::Text => "text",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::UniqueIdentifier => "uniqueidentifier",
            Self::Binary => "binary",
            Self::VarBinary => "varbinary",
        }
    }
}

/// Parameter direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

impl Direction {
    /// Returns whether the caller supplies a value for this direction.
    pub fn is_bound(self) -> bool {
        matches!(self, Self::Input | Self::InputOutput)
    }
}

/// One parameter waiting to be flushed into the data access layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub value: Value,
    pub sql_type: SqlType,
    pub direction: Direction,
}

impl Argument {
    /// Creates an argument, returning `None` when `name` is empty.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<Value>,
        sql_type: SqlType,
        direction: Direction,
    ) -> Option<Self> {
        let name = name.into();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name,
            value: value.into(),
            sql_type,
            direction,
        })
    }
}
