//! Output typing: raw provisioner values to typed `OutputValue`s.
//!
//! Scalar, sequence and mapping are distinct kinds. Nothing is coerced
//! between them, truncated, or flattened.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::OutputError;

/// Declared shape of a module output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// String, number, bool or null.
    Scalar,
    /// Ordered list.
    Sequence,
    /// String-keyed map or object.
    Mapping,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scalar => "a scalar",
            Self::Sequence => "a sequence",
            Self::Mapping => "a mapping",
        })
    }
}

/// A value whose shape has been checked against its declared kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Scalar(Value),
    Sequence(Vec<Value>),
    Mapping(Map<String, Value>),
}

impl TypedValue {
    #[must_use]
    pub fn kind(&self) -> OutputKind {
        match self {
            Self::Scalar(_) => OutputKind::Scalar,
            Self::Sequence(_) => OutputKind::Sequence,
            Self::Mapping(_) => OutputKind::Mapping,
        }
    }

    /// Textual form of a scalar (`None` for collections).
    #[must_use]
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Self::Scalar(v) => Some(scalar_text(v)),
            _ => None,
        }
    }

    /// Converts back to a plain JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Scalar(v) => v.clone(),
            Self::Sequence(items) => Value::Array(items.clone()),
            Self::Mapping(map) => Value::Object(map.clone()),
        }
    }
}

/// A typed output extracted from an applied module.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputValue {
    pub name: String,
    pub value: TypedValue,
}

impl OutputValue {
    #[must_use]
    pub fn kind(&self) -> OutputKind {
        self.value.kind()
    }
}

/// Text of a scalar JSON value: strings unquoted, null empty, others as JSON.
#[must_use]
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Short description of a raw value's shape, used in mismatch errors.
#[must_use]
pub fn describe_shape(value: &Value) -> String {
    match value {
        Value::Array(items) => format!("a sequence of {} element(s)", items.len()),
        Value::Object(map) => format!("a mapping of {} key(s)", map.len()),
        Value::Null => "null".to_string(),
        Value::String(_) => "a string scalar".to_string(),
        Value::Number(_) => "a number scalar".to_string(),
        Value::Bool(_) => "a bool scalar".to_string(),
    }
}

/// Type a raw output value as `expected`.
///
/// # Errors
///
/// Returns `OutputError::Missing` if `raw` is `None` and
/// `OutputError::TypeMismatch` if the value is not of the expected kind.
pub fn type_output(
    module: &str,
    name: &str,
    raw: Option<Value>,
    expected: OutputKind,
) -> Result<OutputValue, OutputError> {
    let Some(raw) = raw else {
        return Err(OutputError::Missing {
            module: module.to_string(),
            name: name.to_string(),
        });
    };

    let value = match (expected, raw) {
        (OutputKind::Sequence, Value::Array(items)) => TypedValue::Sequence(items),
        (OutputKind::Mapping, Value::Object(map)) => TypedValue::Mapping(map),
        (OutputKind::Scalar, v) if !v.is_array() && !v.is_object() => TypedValue::Scalar(v),
        (expected, other) => {
            return Err(OutputError::TypeMismatch {
                module: module.to_string(),
                name: name.to_string(),
                expected,
                actual: describe_shape(&other),
            });
        }
    };

    Ok(OutputValue {
        name: name.to_string(),
        value,
    })
}
