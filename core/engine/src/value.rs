//! FILENAME: core/engine/src/value.rs
//! PURPOSE: Defines the runtime value type shared by every engine component.
//! CONTEXT: Field values arrive as JSON from the form-filling client, flow through
//! the calculation and skip-logic engines, and leave again as JSON. `Value`
//! keeps integers and floats apart so that `10 + 5 * 2` stays `20` while
//! `sqrt(16)` is `4.0`, which is what existing forms display.

use crate::error::EvalError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Mapping from field name to its current value.
pub type FieldValues = HashMap<String, Value>;

/// A dynamically typed field or expression value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

/// A numeric view of a value. Booleans count as 0/1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }
}

impl Value {
    /// Dynamic type name, as reported by the calculate command.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness: null, false, zero, "" and [] are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    pub(crate) fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(*b as i64)),
            Value::Int(n) => Some(Number::Int(*n)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Converts to a float the way a `float(x)` call does: numbers and
    /// booleans convert directly, strings are trimmed and parsed.
    pub fn to_float(&self) -> Result<f64, EvalError> {
        match self {
            Value::Str(s) => s.trim().parse::<f64>().map_err(|_| {
                EvalError::Value(format!("could not convert string to float: {}", self.repr()))
            }),
            other => other.as_number().map(Number::as_f64).ok_or_else(|| {
                EvalError::Type(format!(
                    "float() argument must be a string or a number, not '{}'",
                    other.type_name()
                ))
            }),
        }
    }

    /// Equality across numeric types (`1 == 1.0`, `True == 1`).
    /// Values of unrelated types are simply unequal.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(Number::Int(x)), Some(Number::Int(y))) => x == y,
                (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
                _ => false,
            },
        }
    }

    /// Membership test used by `in`: substring for strings, element
    /// equality for lists.
    pub fn contains_value(&self, needle: &Value) -> Result<bool, EvalError> {
        match (self, needle) {
            (Value::Str(haystack), Value::Str(sub)) => Ok(haystack.contains(sub.as_str())),
            (Value::Str(_), other) => Err(EvalError::Type(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
            (Value::List(items), needle) => Ok(items.iter().any(|item| item.loose_eq(needle))),
            (other, _) => Err(EvalError::Type(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Quoted representation used inside list displays and error messages.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            other => other.to_string(),
        }
    }
}

/// Formats a float with a trailing `.0` for integral values and `e+XX`
/// exponents outside the plain-decimal range.
fn format_float(f: f64, out: &mut fmt::Formatter<'_>) -> fmt::Result {
    if f.is_nan() {
        return write!(out, "nan");
    }
    if f.is_infinite() {
        return write!(out, "{}", if f > 0.0 { "inf" } else { "-inf" });
    }

    let magnitude = f.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let sci = format!("{:e}", f);
        return match sci.split_once('e') {
            Some((mantissa, exp)) => {
                let (sign, digits) = match exp.strip_prefix('-') {
                    Some(d) => ('-', d),
                    None => ('+', exp),
                };
                write!(out, "{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => write!(out, "{}", sci),
        };
    }

    let plain = f.to_string();
    if plain.contains('.') {
        write!(out, "{}", plain)
    } else {
        write!(out, "{}.0", plain)
    }
}

/// Display is the `str(x)` conversion used by concat/str/upper/lower.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => format_float(*x, f),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.repr())?;
                }
                write!(f, "]")
            }
        }
    }
}

/// JSON objects have no counterpart in the field value model and map to null.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(_) => Value::Null,
        }
    }
}

/// Non-finite floats have no JSON form and serialize as null.
impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(n) => serde_json::Value::from(n),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Builds a field value map from a JSON object. Non-object input yields an empty map.
pub fn field_values_from_json(json: serde_json::Value) -> FieldValues {
    match json {
        serde_json::Value::Object(map) => map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
        _ => FieldValues::new(),
    }
}
