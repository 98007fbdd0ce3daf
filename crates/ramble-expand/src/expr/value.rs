use std::fmt::{self, Display};

use ramble_core::{format_float, VarValue};

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The `None` literal.
    None,
    /// `True` / `False`.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    Str(String),
    /// Literal list or materialised `range`.
    List(Vec<Value>),
}

/// Numeric view of a value; booleans count as `0` / `1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Number::Int(value) => value as f64,
            Number::Float(value) => value,
        }
    }
}

impl Value {
    /// Short type label used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
        }
    }

    pub(crate) fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(flag) => Some(Number::Int(i64::from(*flag))),
            Value::Int(value) => Some(Number::Int(*value)),
            Value::Float(value) => Some(Number::Float(*value)),
            _ => None,
        }
    }

    fn repr(&self) -> String {
        match self {
            Value::Str(text) => format!("'{text}'"),
            other => other.to_string(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => f.write_str(&format_float(*value)),
            Value::Str(text) => f.write_str(text),
            Value::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&item.repr())?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&VarValue> for Value {
    fn from(value: &VarValue) -> Self {
        match value {
            VarValue::Bool(flag) => Value::Bool(*flag),
            VarValue::Int(number) => Value::Int(*number),
            VarValue::Float(number) => Value::Float(*number),
            VarValue::Str(text) => Value::Str(text.clone()),
            VarValue::List(items) => Value::List(items.iter().map(Value::from).collect()),
        }
    }
}
