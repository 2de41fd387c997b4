//! Value coercion between raw `Value`s and typed record fields.
//!
//! # Responsibility
//! - Convert raw column values into field types (numeric widening/narrowing,
//!   string parsing, enum member parsing).
//! - Convert field values back into raw values for column maps.
//!
//! # Invariants
//! - NULL only converts into `Option<_>` targets; every other target rejects it.
//! - Narrowing never wraps; out-of-range values are errors.

use crate::model::value::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Failure to coerce one raw value into a target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// NULL (or an empty string form) reached a target that cannot be absent.
    NullForRequired { target: &'static str },
    /// The value kind or text cannot be interpreted as the target type.
    InvalidValue {
        target: &'static str,
        found: &'static str,
        value: String,
    },
    /// The value is numeric but does not fit the target type.
    OutOfRange { target: &'static str, value: String },
    /// The string form matches no member of the target enum.
    UnknownVariant { target: &'static str, value: String },
}

impl Display for ConversionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NullForRequired { target } => {
                write!(f, "cannot assign an empty value to non-optional `{target}`")
            }
            Self::InvalidValue {
                target,
                found,
                value,
            } => write!(f, "cannot convert {found} value `{value}` to `{target}`"),
            Self::OutOfRange { target, value } => {
                write!(f, "value `{value}` is out of range for `{target}`")
            }
            Self::UnknownVariant { target, value } => {
                write!(f, "`{value}` is not a member of enum `{target}`")
            }
        }
    }
}

impl Error for ConversionError {}

/// Builds a typed value from a raw value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, ConversionError>;
}

/// Produces the raw value of a typed field.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

fn invalid(target: &'static str, value: &Value) -> ConversionError {
    ConversionError::InvalidValue {
        target,
        found: value.kind(),
        value: value.to_string(),
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

macro_rules! integer_conversions {
    ($($target:ty),+ $(,)?) => {
        $(
            impl FromValue for $target {
                fn from_value(value: &Value) -> Result<Self, ConversionError> {
                    let target = stringify!($target);
                    match value {
                        Value::Null => Err(ConversionError::NullForRequired { target }),
                        Value::Integer(number) => <$target>::try_from(*number).map_err(|_| {
                            ConversionError::OutOfRange {
                                target,
                                value: number.to_string(),
                            }
                        }),
                        Value::Real(number) => {
                            let rounded = number.round_ties_even();
                            // MAX + 1 is a power of two, exact in f64 even where MAX is not.
                            if rounded.is_finite()
                                && rounded >= <$target>::MIN as f64
                                && rounded < <$target>::MAX as f64 + 1.0
                            {
                                Ok(rounded as $target)
                            } else {
                                Err(ConversionError::OutOfRange {
                                    target,
                                    value: number.to_string(),
                                })
                            }
                        }
                        Value::Bool(flag) => Ok(<$target>::from(*flag)),
                        Value::Text(text) => text.trim().parse::<$target>().map_err(|_| invalid(target, value)),
                        Value::Blob(_) => Err(invalid(target, value)),
                    }
                }
            }

            impl ToValue for $target {
                fn to_value(&self) -> Value {
                    i64::try_from(*self).map_or_else(|_| Value::Text(self.to_string()), Value::Integer)
                }
            }
        )+
    };
}

integer_conversions!(i8, i16, i32, i64, u8, u16, u32, u64);

macro_rules! float_conversions {
    ($($target:ty),+ $(,)?) => {
        $(
            impl FromValue for $target {
                fn from_value(value: &Value) -> Result<Self, ConversionError> {
                    let target = stringify!($target);
                    match value {
                        Value::Null => Err(ConversionError::NullForRequired { target }),
                        Value::Integer(number) => Ok(*number as $target),
                        Value::Real(number) => Ok(*number as $target),
                        Value::Bool(flag) => Ok(if *flag { 1.0 } else { 0.0 }),
                        Value::Text(text) => text.trim().parse::<$target>().map_err(|_| invalid(target, value)),
                        Value::Blob(_) => Err(invalid(target, value)),
                    }
                }
            }

            impl ToValue for $target {
                fn to_value(&self) -> Value {
                    Value::Real(f64::from(*self))
                }
            }
        )+
    };
}

float_conversions!(f32, f64);

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Err(ConversionError::NullForRequired { target: "bool" }),
            Value::Bool(flag) => Ok(*flag),
            Value::Integer(number) => Ok(*number != 0),
            Value::Real(number) => Ok(*number != 0.0),
            Value::Text(text) => {
                let text = text.trim();
                if text.eq_ignore_ascii_case("true") || text == "1" {
                    Ok(true)
                } else if text.eq_ignore_ascii_case("false") || text == "0" {
                    Ok(false)
                } else {
                    Err(invalid("bool", value))
                }
            }
            Value::Blob(_) => Err(invalid("bool", value)),
        }
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Err(ConversionError::NullForRequired { target: "String" }),
            other => Ok(other.to_string()),
        }
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToValue for &str {
    fn to_value(&self) -> Value {
        Value::Text((*self).to_string())
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Err(ConversionError::NullForRequired { target: "Uuid" }),
            Value::Text(text) => Uuid::parse_str(text.trim()).map_err(|_| invalid("Uuid", value)),
            Value::Blob(bytes) => Uuid::from_slice(bytes).map_err(|_| invalid("Uuid", value)),
            other => Err(invalid("Uuid", other)),
        }
    }
}

impl ToValue for Uuid {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Err(ConversionError::NullForRequired { target: "Vec<u8>" }),
            Value::Blob(bytes) => Ok(bytes.clone()),
            other => Err(invalid("Vec<u8>", other)),
        }
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }
}

/// Implements `FromValue`/`ToValue` for a fieldless enum by member name.
///
/// Parsing is exact and case-sensitive against the listed member names.
///
/// ```
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// enum Status {
///     #[default]
///     Active,
///     Suspended,
/// }
/// entitier_core::impl_enum_value!(Status { Active, Suspended });
/// ```
#[macro_export]
macro_rules! impl_enum_value {
    ($enum:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::mapper::FromValue for $enum {
            fn from_value(
                value: &$crate::Value,
            ) -> ::std::result::Result<Self, $crate::mapper::ConversionError> {
                if value.is_null() {
                    return Err($crate::mapper::ConversionError::NullForRequired {
                        target: stringify!($enum),
                    });
                }
                match value.to_string().as_str() {
                    $(stringify!($variant) => Ok($enum::$variant),)+
                    other => Err($crate::mapper::ConversionError::UnknownVariant {
                        target: stringify!($enum),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl $crate::mapper::ToValue for $enum {
            fn to_value(&self) -> $crate::Value {
                let name = match self {
                    $($enum::$variant => stringify!($variant),)+
                };
                $crate::Value::Text(name.to_string())
            }
        }
    };
}
