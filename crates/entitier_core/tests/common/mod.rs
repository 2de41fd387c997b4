#![allow(dead_code)]

use entitier_core::{
    impl_enum_value, impl_record, ColumnMap, DalError, DalResult, DataAccess, Direction, SqlType,
    Value,
};
use std::cell::Cell;
use std::rc::Rc;

/// One observed collaborator call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect,
    Disconnect,
    AddParameter {
        name: String,
        value: Value,
        sql_type: SqlType,
        direction: Direction,
    },
    Execute {
        procedure: String,
        scalar: bool,
        id_return_name: String,
    },
    ExecuteWithTransaction {
        procedure: String,
        id_return_name: String,
    },
    TransactionFinish(bool),
    Read {
        procedure: String,
        expected: Vec<String>,
    },
    ReadList {
        procedure: String,
        expected: Vec<String>,
    },
}

/// Scripted collaborator that records every call.
#[derive(Default)]
pub struct RecordingDataAccess {
    pub calls: Vec<Call>,
    pub rows_affected: i64,
    pub id: Value,
    pub return_value: String,
    pub scalar_value: Value,
    pub read_row: Option<ColumnMap>,
    pub read_rows: Vec<ColumnMap>,
    pub fail_with: Option<String>,
    pub id_return_name: String,
    pub connection: Option<String>,
    pub transaction: Option<u32>,
    pub dispose_count: Rc<Cell<u32>>,
}

impl RecordingDataAccess {
    pub fn affecting(rows_affected: i64) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }

    pub fn bound_parameters(&self) -> Vec<(String, Value)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::AddParameter { name, value, .. } => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    fn fail_if_scripted(&self) -> DalResult<()> {
        match &self.fail_with {
            Some(message) => Err(DalError::Backend(message.clone().into())),
            None => Ok(()),
        }
    }
}

fn sorted_names(expected: &ColumnMap) -> Vec<String> {
    let mut names: Vec<String> = expected.keys().cloned().collect();
    names.sort();
    names
}

impl DataAccess for RecordingDataAccess {
    type Connection = String;
    type Transaction = u32;

    fn connect(&mut self) -> DalResult<()> {
        self.calls.push(Call::Connect);
        Ok(())
    }

    fn disconnect(&mut self) -> DalResult<()> {
        self.calls.push(Call::Disconnect);
        Ok(())
    }

    fn connection(&self) -> Option<&String> {
        self.connection.as_ref()
    }

    fn set_connection(&mut self, connection: Option<String>) {
        self.connection = connection;
    }

    fn transaction(&self) -> Option<&u32> {
        self.transaction.as_ref()
    }

    fn set_transaction(&mut self, transaction: Option<u32>) {
        self.transaction = transaction;
    }

    fn add_parameter(&mut self, name: &str, value: Value, sql_type: SqlType, direction: Direction) {
        self.calls.push(Call::AddParameter {
            name: name.to_string(),
            value,
            sql_type,
            direction,
        });
    }

    fn execute(&mut self, procedure: &str, scalar: bool) -> DalResult<()> {
        self.calls.push(Call::Execute {
            procedure: procedure.to_string(),
            scalar,
            id_return_name: self.id_return_name.clone(),
        });
        self.fail_if_scripted()
    }

    fn execute_with_transaction(&mut self, procedure: &str) -> DalResult<()> {
        self.calls.push(Call::ExecuteWithTransaction {
            procedure: procedure.to_string(),
            id_return_name: self.id_return_name.clone(),
        });
        self.fail_if_scripted()
    }

    fn transaction_finish(&mut self, commit: bool) -> DalResult<()> {
        self.calls.push(Call::TransactionFinish(commit));
        Ok(())
    }

    fn read(&mut self, procedure: &str, expected: &ColumnMap) -> DalResult<Option<ColumnMap>> {
        self.calls.push(Call::Read {
            procedure: procedure.to_string(),
            expected: sorted_names(expected),
        });
        self.fail_if_scripted()?;
        Ok(self.read_row.clone())
    }

    fn read_list(&mut self, procedure: &str, expected: &ColumnMap) -> DalResult<Vec<ColumnMap>> {
        self.calls.push(Call::ReadList {
            procedure: procedure.to_string(),
            expected: sorted_names(expected),
        });
        self.fail_if_scripted()?;
        Ok(self.read_rows.clone())
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
        self.dispose_count.set(self.dispose_count.get() + 1);
        Ok(())
    }
}

/// Builds a column map from `(name, value)` pairs.
pub fn columns<const N: usize>(pairs: [(&str, Value); N]) -> ColumnMap {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerStatus {
    Active,
    Suspended,
    Closed,
}

impl_enum_value!(CustomerStatus {
    Active,
    Suspended,
    Closed
});

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Customer {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub status: Option<CustomerStatus>,
    pub credit_limit: Option<f64>,
    pub vip: Option<bool>,
}

impl_record!(Customer {
    "Id" => id,
    "Name" => name,
    "Status" => status,
    "CreditLimit" => credit_limit,
    "Vip" => vip,
});

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomerSummary {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub order_count: Option<i32>,
}

impl_record!(CustomerSummary {
    "Id" => id,
    "Name" => name,
    "OrderCount" => order_count,
});
