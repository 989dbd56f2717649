//! Storage types and the mapping from Rust field types onto them.
//!
//! Conversions out of the engine follow one policy: a NULL read into a non-optional
//! destination is a [`TypeError`], never a silent zero. Outer-join nulls are detected by
//! the selection before any field is read, so records never see them.

use crate::error::{Result, TypeError};
use crate::value::Value;

/// Semantic storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Integer,
    Real,
    Text,
    Blob,
}

impl SqlType {
    /// Type name used in column definitions.
    pub const fn sql_name(self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
            SqlType::Blob => "BLOB",
        }
    }
}

/// A Rust type that can be stored in a single column.
pub trait FieldType: Sized {
    /// Storage type inferred for columns of this type.
    const SQL_TYPE: SqlType;
    /// Whether the column accepts NULL (true for `Option<T>`).
    const NULLABLE: bool = false;

    /// Convert into a bindable value.
    fn to_value(&self) -> Value;

    /// Convert from a value read out of a result column.
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(expected: &'static str, value: &Value) -> crate::Error {
    TypeError {
        expected,
        found: value.storage_class(),
        column: None,
    }
    .into()
}

fn integer_of(expected: &'static str, value: &Value) -> Result<i64> {
    match value {
        Value::BigInt(v) => Ok(*v),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Double(d) if d.fract() == 0.0 && d.is_finite() => Ok(*d as i64),
        other => Err(mismatch(expected, other)),
    }
}

macro_rules! impl_integer_field {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FieldType for $ty {
                const SQL_TYPE: SqlType = SqlType::Integer;

                fn to_value(&self) -> Value {
                    Value::BigInt(i64::from(*self))
                }

                fn from_value(value: &Value) -> Result<Self> {
                    let raw = integer_of("INTEGER", value)?;
                    <$ty>::try_from(raw).map_err(|_| {
                        TypeError {
                            expected: concat!("INTEGER in range of ", stringify!($ty)),
                            found: "INTEGER",
                            column: None,
                        }
                        .into()
                    })
                }
            }
        )+
    };
}

impl_integer_field!(i8, i16, i32, i64, u8, u16, u32);

impl FieldType for bool {
    const SQL_TYPE: SqlType = SqlType::Integer;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: &Value) -> Result<Self> {
        integer_of("INTEGER (boolean)", value).map(|v| v != 0)
    }
}

impl FieldType for f64 {
    const SQL_TYPE: SqlType = SqlType::Real;

    fn to_value(&self) -> Value {
        Value::Double(*self)
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Double(v) => Ok(*v),
            Value::BigInt(v) => Ok(*v as f64),
            Value::Bool(b) => Ok(f64::from(u8::from(*b))),
            other => Err(mismatch("REAL", other)),
        }
    }
}

impl FieldType for f32 {
    const SQL_TYPE: SqlType = SqlType::Real;

    fn to_value(&self) -> Value {
        Value::Double(f64::from(*self))
    }

    fn from_value(value: &Value) -> Result<Self> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FieldType for String {
    const SQL_TYPE: SqlType = SqlType::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Bytes(b) => String::from_utf8(b.clone()).map_err(|_| mismatch("TEXT", value)),
            Value::BigInt(v) => Ok(v.to_string()),
            Value::Double(v) => Ok(v.to_string()),
            Value::Bool(b) => Ok(u8::from(*b).to_string()),
            other => Err(mismatch("TEXT", other)),
        }
    }
}

impl FieldType for Vec<u8> {
    const SQL_TYPE: SqlType = SqlType::Blob;

    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.clone().into_bytes()),
            Value::BigInt(v) => Ok(v.to_string().into_bytes()),
            Value::Double(v) => Ok(v.to_string().into_bytes()),
            other => Err(mismatch("BLOB", other)),
        }
    }
}

impl<T: FieldType> FieldType for Option<T> {
    const SQL_TYPE: SqlType = T::SQL_TYPE;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, T::to_value)
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
