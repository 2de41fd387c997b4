//! Field descriptors for mappable record types.
//!
//! # Responsibility
//! - Describe a record's public properties as name -> getter/setter pairs.
//! - Resolve property names once per type and cache the lookup index.
//!
//! # Invariants
//! - Property names are matched exactly (case-sensitive).
//! - A name appears at most once in a table; the first declaration wins.

use super::convert::ConversionError;
use crate::model::value::Value;
use std::collections::HashMap;

/// Reads one property as a raw value.
pub type Getter<T> = fn(&T) -> Value;
/// Writes one property from a raw value.
pub type Setter<T> = fn(&mut T, &Value) -> Result<(), ConversionError>;

/// One named property of record type `T`.
pub struct Field<T> {
    name: &'static str,
    get: Option<Getter<T>>,
    set: Option<Setter<T>>,
}

impl<T> Field<T> {
    /// Readable and writable property.
    pub const fn new(name: &'static str, get: Getter<T>, set: Setter<T>) -> Self {
        Self {
            name,
            get: Some(get),
            set: Some(set),
        }
    }

    /// Property without a setter; column values for it are never assigned.
    pub const fn read_only(name: &'static str, get: Getter<T>) -> Self {
        Self {
            name,
            get: Some(get),
            set: None,
        }
    }

    /// Property without a getter; it never appears in produced column maps.
    pub const fn write_only(name: &'static str, set: Setter<T>) -> Self {
        Self {
            name,
            get: None,
            set: Some(set),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_readable(&self) -> bool {
        self.get.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    /// Returns the current value, or `None` for write-only properties.
    pub fn read(&self, record: &T) -> Option<Value> {
        self.get.map(|get| get(record))
    }

    /// Assigns `value`, or returns `None` for read-only properties.
    pub fn write(&self, record: &mut T, value: &Value) -> Option<Result<(), ConversionError>> {
        self.set.map(|set| set(record, value))
    }
}

/// Ordered property list of one record type plus a name index.
pub struct FieldTable<T> {
    fields: Vec<Field<T>>,
    index: HashMap<&'static str, usize>,
}

impl<T> FieldTable<T> {
    pub fn new(fields: Vec<Field<T>>) -> Self {
        let mut index = HashMap::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            index.entry(field.name).or_insert(position);
        }
        Self { fields, index }
    }

    /// Looks up a property by exact name.
    pub fn get(&self, name: &str) -> Option<&Field<T>> {
        self.index.get(name).map(|position| &self.fields[*position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field<T>> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A flat record that can be built from and projected into column maps.
///
/// Implementations return a table built once per type, usually through a
/// `once_cell::sync::Lazy` static or the [`impl_record!`](crate::impl_record)
/// macro.
pub trait Record: Default + 'static {
    fn field_table() -> &'static FieldTable<Self>;
}

/// Implements [`Record`] for a struct whose listed fields are all readable and
/// writable.
///
/// Each entry maps a column name to a struct field whose type implements both
/// `FromValue` and `ToValue`.
///
/// ```
/// #[derive(Debug, Default)]
/// struct Order {
///     id: i64,
///     note: Option<String>,
/// }
/// entitier_core::impl_record!(Order {
///     "Id" => id,
///     "Note" => note,
/// });
/// ```
#[macro_export]
macro_rules! impl_record {
    ($record:ident { $($column:literal => $field:ident),+ $(,)? }) => {
        impl $crate::mapper::Record for $record {
            fn field_table() -> &'static $crate::mapper::FieldTable<Self> {
                static TABLE: $crate::__private::Lazy<$crate::mapper::FieldTable<$record>> =
                    $crate::__private::Lazy::new(|| {
                        $crate::mapper::FieldTable::new(vec![
                            $(
                                $crate::mapper::Field::new(
                                    $column,
                                    |record: &$record| {
                                        $crate::mapper::ToValue::to_value(&record.$field)
                                    },
                                    |record: &mut $record, value: &$crate::Value| {
                                        record.$field = $crate::mapper::FromValue::from_value(value)?;
                                        Ok(())
                                    },
                                ),
                            )+
                        ])
                    });
                &TABLE
            }
        }
    };
}
