//! Typed configuration values and path-value records.

use crate::Index;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The scalar or list type of a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Empty,
    String,
    Int,
    Uint,
    Bool,
    Float,
    Decimal,
    Bytes,
    StringList,
    IntList,
    UintList,
    BoolList,
}

/// A configuration value together with its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TypedValue {
    Empty,
    String(String),
    Int(i64),
    Uint(u64),
    Bool(bool),
    Float(f64),
    /// Fixed-point decimal: `digits / 10^precision`.
    Decimal { digits: i64, precision: u32 },
    Bytes(Vec<u8>),
    StringList(Vec<String>),
    IntList(Vec<i64>),
    UintList(Vec<u64>),
    BoolList(Vec<bool>),
}

impl TypedValue {
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Empty => ValueType::Empty,
            Self::String(_) => ValueType::String,
            Self::Int(_) => ValueType::Int,
            Self::Uint(_) => ValueType::Uint,
            Self::Bool(_) => ValueType::Bool,
            Self::Float(_) => ValueType::Float,
            Self::Decimal { .. } => ValueType::Decimal,
            Self::Bytes(_) => ValueType::Bytes,
            Self::StringList(_) => ValueType::StringList,
            Self::IntList(_) => ValueType::IntList,
            Self::UintList(_) => ValueType::UintList,
            Self::BoolList(_) => ValueType::BoolList,
        }
    }

    /// Renders the value as JSON for inclusion in a configuration document.
    ///
    /// Non-finite floats render as `null`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::String(s) => Value::String(s.clone()),
            Self::Int(i) => Value::from(*i),
            Self::Uint(u) => Value::from(*u),
            Self::Bool(b) => Value::Bool(*b),
            Self::Float(f) => float_json(*f),
            Self::Decimal { digits, precision } => {
                float_json(*digits as f64 / 10f64.powi(*precision as i32))
            }
            Self::Bytes(b) => Value::from(b.clone()),
            Self::StringList(l) => Value::from(l.clone()),
            Self::IntList(l) => Value::from(l.clone()),
            Self::UintList(l) => Value::from(l.clone()),
            Self::BoolList(l) => Value::from(l.clone()),
        }
    }
}

fn float_json(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// The smallest unit of configuration state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathValue {
    pub path: String,
    pub value: TypedValue,
    #[serde(default)]
    pub removed: bool,
    /// Index of the transaction that wrote this value. Unassigned inside a
    /// change request.
    #[serde(default)]
    pub index: Index,
}

impl PathValue {
    /// A value to be set at `path`.
    pub fn new(path: impl Into<String>, value: TypedValue) -> Self {
        Self {
            path: path.into(),
            value,
            removed: false,
            index: Index::NONE,
        }
    }

    /// A deletion of `path`.
    pub fn removed(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: TypedValue::Empty,
            removed: true,
            index: Index::NONE,
        }
    }

    /// Returns a copy stamped with the writing transaction's index.
    #[must_use]
    pub fn stamped(&self, index: Index) -> Self {
        Self {
            index,
            ..self.clone()
        }
    }
}
