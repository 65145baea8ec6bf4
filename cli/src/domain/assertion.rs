//! Assertion predicates over typed outputs and live resource attributes.
//!
//! Pure functions only. Every predicate produces an `AssertionResult`;
//! callers evaluate all of a module's predicates without short-circuiting.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stackcheck_common::AssertionResult;

use crate::domain::output::{TypedValue, scalar_text};

/// Expected-vs-actual check, written in the suite file as e.g.
/// `not_empty`, `{length: 3}`, `{equals: test}`, `{one_of: [a, b]}`,
/// `{contains: subnet-1}`, `{has_entry: {key: Environment, value: test}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    NotEmpty,
    Length(usize),
    Equals(Value),
    OneOf(Vec<Value>),
    Contains(Value),
    HasEntry { key: String, value: Value },
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotEmpty => f.write_str("not empty"),
            Self::Length(n) => write!(f, "length == {n}"),
            Self::Equals(v) => write!(f, "== {}", quoted(v)),
            Self::OneOf(set) => {
                let items: Vec<String> = set.iter().map(quoted).collect();
                write!(f, "in [{}]", items.join(", "))
            }
            Self::Contains(v) => write!(f, "contains {}", quoted(v)),
            Self::HasEntry { key, value } => write!(f, "has entry {key}={}", quoted(value)),
        }
    }
}

impl Predicate {
    /// Evaluate this predicate against `actual`.
    ///
    /// `actual` is `None` when the subject does not exist (an absent tag or
    /// attribute); every predicate fails on an absent subject.
    #[must_use]
    pub fn evaluate(&self, subject: &str, actual: Option<&TypedValue>) -> AssertionResult {
        let verdict = match actual {
            None => Err(format!("{subject} is absent")),
            Some(value) => self.check(subject, value),
        };
        let (passed, explanation) = match verdict {
            Ok(msg) => (true, msg),
            Err(msg) => (false, msg),
        };
        AssertionResult {
            subject: subject.to_string(),
            predicate: self.to_string(),
            passed,
            explanation,
        }
    }

    fn check(&self, subject: &str, actual: &TypedValue) -> Result<String, String> {
        match self {
            Self::NotEmpty => {
                if is_empty(actual) {
                    Err(format!(
                        "expected {subject} to be non-empty, got {}",
                        render(actual)
                    ))
                } else {
                    Ok(format!("{subject} is non-empty"))
                }
            }
            Self::Length(expected) => {
                let len = match actual {
                    TypedValue::Sequence(items) => items.len(),
                    TypedValue::Mapping(map) => map.len(),
                    TypedValue::Scalar(_) => {
                        return Err(format!(
                            "length applies to sequences and mappings, but {subject} is a scalar"
                        ));
                    }
                };
                if len == *expected {
                    Ok(format!("{subject} has length {len}"))
                } else {
                    Err(format!(
                        "expected {subject} to have length {expected}, got {len}"
                    ))
                }
            }
            Self::Equals(expected) => {
                if values_equal(actual, expected) {
                    Ok(format!("{subject} == {}", quoted(expected)))
                } else {
                    Err(format!(
                        "expected {subject} to equal {}, got {}",
                        quoted(expected),
                        render(actual)
                    ))
                }
            }
            Self::OneOf(set) => {
                if set.iter().any(|candidate| values_equal(actual, candidate)) {
                    Ok(format!("{subject} is {}", render(actual)))
                } else {
                    Err(format!(
                        "expected {subject} to be one of {}, got {}",
                        render_set(set),
                        render(actual)
                    ))
                }
            }
            Self::Contains(needle) => {
                let found = match actual {
                    TypedValue::Sequence(items) => items.iter().any(|item| json_equal(item, needle)),
                    TypedValue::Mapping(map) => map.contains_key(&scalar_text(needle)),
                    TypedValue::Scalar(v) => scalar_text(v).contains(&scalar_text(needle)),
                };
                if found {
                    Ok(format!("{subject} contains {}", quoted(needle)))
                } else {
                    Err(format!(
                        "expected {subject} to contain {}, got {}",
                        quoted(needle),
                        render(actual)
                    ))
                }
            }
            Self::HasEntry { key, value } => {
                let TypedValue::Mapping(map) = actual else {
                    return Err(format!(
                        "has_entry applies to mappings, but {subject} is {}",
                        actual.kind()
                    ));
                };
                match map.get(key) {
                    Some(found) if json_equal(found, value) => {
                        Ok(format!("{subject} has {key}={}", quoted(value)))
                    }
                    Some(found) => Err(format!(
                        "expected {subject}.{key} to equal {}, got {}",
                        quoted(value),
                        quoted(found)
                    )),
                    None => Err(format!("expected {subject} to have key {key}, it is absent")),
                }
            }
        }
    }
}

fn is_empty(value: &TypedValue) -> bool {
    match value {
        TypedValue::Scalar(v) => scalar_text(v).is_empty(),
        TypedValue::Sequence(items) => items.is_empty(),
        TypedValue::Mapping(map) => map.is_empty(),
    }
}

/// Scalars compare by text so that `3` and `"3"` match; collections compare
/// structurally.
fn values_equal(actual: &TypedValue, expected: &Value) -> bool {
    json_equal(&actual.to_json(), expected)
}

fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| json_equal(p, q))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| json_equal(v, other)))
        }
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => false,
        (x, y) => scalar_text(x) == scalar_text(y),
    }
}

fn quoted(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{s:?}"),
        other => other.to_string(),
    }
}

fn render(value: &TypedValue) -> String {
    quoted(&value.to_json())
}

fn render_set(set: &[Value]) -> String {
    let items: Vec<String> = set.iter().map(quoted).collect();
    format!("[{}]", items.join(", "))
}
