use serde::Deserialize;
use serde::Serialize;

use crate::AccessError;
use crate::Result;

/// Static type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Any,
    Boolean,
    Short,
    Int,
    Long,
    Double,
    String,
    Binary,
    BooleanList,
    ShortList,
    IntList,
    LongList,
    DoubleList,
    StringList,
    BinaryList,
}

/// A dynamically typed setting value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Short(i16),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
    BooleanList(Vec<bool>),
    ShortList(Vec<i16>),
    IntList(Vec<i32>),
    LongList(Vec<i64>),
    DoubleList(Vec<f64>),
    StringList(Vec<String>),
    BinaryList(Vec<Vec<u8>>),
}

impl Value {
    /// Dynamic type of the value, `None` for nil.
    pub fn value_type(&self) -> Option<ValueType> {
        let ty = match self {
            Value::Nil => return None,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Short(_) => ValueType::Short,
            Value::Int(_) => ValueType::Int,
            Value::Long(_) => ValueType::Long,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Binary(_) => ValueType::Binary,
            Value::BooleanList(_) => ValueType::BooleanList,
            Value::ShortList(_) => ValueType::ShortList,
            Value::IntList(_) => ValueType::IntList,
            Value::LongList(_) => ValueType::LongList,
            Value::DoubleList(_) => ValueType::DoubleList,
            Value::StringList(_) => ValueType::StringList,
            Value::BinaryList(_) => ValueType::BinaryList,
        };
        Some(ty)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StringList(v)
    }
}

/// Checks that `value` may be stored in a property of type `ty`.
///
/// `Any` accepts every non-nil value; a concrete type accepts values of
/// exactly that type. Nil is accepted only when `nillable` is set.
pub fn check_value(
    value: &Value,
    ty: ValueType,
    nillable: bool,
) -> Result<()> {
    let ok = match value.value_type() {
        None => nillable,
        Some(actual) => ty == ValueType::Any || actual == ty,
    };
    if ok {
        Ok(())
    } else {
        Err(AccessError::illegal(format!(
            "inappropriate property value {value:?} for type {ty:?}"
        )))
    }
}
