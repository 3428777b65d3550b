//! Literal values and their text codec.
//!
//! Default arguments are stored as text and must parse back to an equal
//! value. The text form is JSON; integers and floats keep their kind
//! (`1` and `1.0` decode differently) and non-finite floats are rejected
//! because they have no faithful representation.

use std::collections::BTreeMap;
use std::fmt;

use rhai::{Array, Dynamic, ImmutableString, Map};
use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, CodecError};

/// A value that can be written as a literal and read back unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Literal>),
    Map(BTreeMap<String, Literal>),
}

impl Literal {
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Unit => "unit",
            Literal::Bool(_) => "bool",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Str(_) => "string",
            Literal::Array(_) => "array",
            Literal::Map(_) => "map",
        }
    }

    /// Convert into a script value.
    pub fn to_dynamic(&self) -> Dynamic {
        match self {
            Literal::Unit => Dynamic::UNIT,
            Literal::Bool(b) => Dynamic::from_bool(*b),
            Literal::Int(i) => Dynamic::from_int(*i),
            Literal::Float(f) => Dynamic::from_float(*f),
            Literal::Str(s) => Dynamic::from(s.clone()),
            Literal::Array(items) => {
                Dynamic::from_array(items.iter().map(Literal::to_dynamic).collect())
            }
            Literal::Map(entries) => Dynamic::from_map(
                entries
                    .iter()
                    .map(|(k, v)| (k.as_str().into(), v.to_dynamic()))
                    .collect(),
            ),
        }
    }

    /// Convert a script value, failing for anything without a literal form.
    pub fn from_dynamic(value: Dynamic) -> Result<Self, String> {
        if value.is_unit() {
            return Ok(Literal::Unit);
        }
        if let Ok(b) = value.as_bool() {
            return Ok(Literal::Bool(b));
        }
        if let Ok(i) = value.as_int() {
            return Ok(Literal::Int(i));
        }
        if let Ok(f) = value.as_float() {
            return Ok(Literal::Float(f));
        }
        let type_name = value.type_name();
        if value.is::<ImmutableString>() {
            return value
                .into_immutable_string()
                .map(|s| Literal::Str(s.to_string()))
                .map_err(|e| e.to_string());
        }
        if value.is::<Array>() {
            let items = value.try_cast::<Array>().unwrap_or_default();
            return items
                .into_iter()
                .map(Literal::from_dynamic)
                .collect::<Result<Vec<_>, _>>()
                .map(Literal::Array);
        }
        if value.is::<Map>() {
            let entries = value.try_cast::<Map>().unwrap_or_default();
            return entries
                .into_iter()
                .map(|(k, v)| Literal::from_dynamic(v).map(|v| (k.to_string(), v)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Literal::Map);
        }
        Err(format!("values of type `{type_name}` have no literal form"))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Int(i)
    }
}

impl From<f64> for Literal {
    fn from(f: f64) -> Self {
        Literal::Float(f)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Str(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Str(s)
    }
}

impl From<Vec<Literal>> for Literal {
    fn from(items: Vec<Literal>) -> Self {
        Literal::Array(items)
    }
}

impl From<BTreeMap<String, Literal>> for Literal {
    fn from(entries: BTreeMap<String, Literal>) -> Self {
        Literal::Map(entries)
    }
}

/// Encode a literal as text.
pub fn encode(value: &Literal) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}

/// Parse literal text.
pub fn decode(text: &str) -> Result<Literal, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode and verify that the text decodes back to an equal value.
///
/// `what` names the value in the error (e.g. `argument 0`).
pub fn encode_checked(value: &Literal, what: &str) -> Result<String, CaptureError> {
    let non_literal = |reason: String| CaptureError::NonLiteralValue {
        what: what.to_string(),
        reason,
    };
    let text = encode(value).map_err(|e| non_literal(e.to_string()))?;
    match decode(&text) {
        Ok(back) if back == *value => Ok(text),
        Ok(back) => Err(non_literal(format!(
            "{value:?} does not survive its text form `{text}` (decodes as {back:?})"
        ))),
        Err(e) => Err(non_literal(e.to_string())),
    }
}

/// Decode text that must hold a positional argument list.
pub fn decode_args(text: &str) -> Result<Vec<Literal>, CodecError> {
    match decode(text)? {
        Literal::Array(items) => Ok(items),
        other => Err(CodecError::WrongShape {
            expected: "array",
            found: other.kind(),
        }),
    }
}

/// Decode text that must hold a keyword argument map.
pub fn decode_kwargs(text: &str) -> Result<BTreeMap<String, Literal>, CodecError> {
    match decode(text)? {
        Literal::Map(entries) => Ok(entries),
        other => Err(CodecError::WrongShape {
            expected: "map",
            found: other.kind(),
        }),
    }
}
