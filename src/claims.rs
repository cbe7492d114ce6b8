use serde::{
    ser::{Error as _, SerializeMap},
    Serialize, Serializer,
};
use serde_json::Value;

use crate::TokenError;

/// A single JSON-compatible claim value.
#[derive(Clone, Debug, PartialEq)]
pub enum Claim {
    String(String),
    Integer(i64),
    /// Serialized as a JSON number. NaN and the infinities are rejected when
    /// the claim set is encoded.
    Float(f64),
    Bool(bool),
    List(Vec<String>),
    Json(Value),
}

impl Serialize for Claim {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Claim::String(value) => serializer.serialize_str(value),
            Claim::Integer(value) => serializer.serialize_i64(*value),
            Claim::Float(value) if !value.is_finite() => Err(S::Error::custom(format!(
                "claim value {value} is not a finite number"
            ))),
            Claim::Float(value) => serializer.serialize_f64(*value),
            Claim::Bool(value) => serializer.serialize_bool(*value),
            Claim::List(values) => values.serialize(serializer),
            Claim::Json(value) => value.serialize(serializer),
        }
    }
}

impl From<&str> for Claim {
    fn from(value: &str) -> Self {
        Claim::String(value.to_owned())
    }
}

impl From<String> for Claim {
    fn from(value: String) -> Self {
        Claim::String(value)
    }
}

impl From<i64> for Claim {
    fn from(value: i64) -> Self {
        Claim::Integer(value)
    }
}

impl From<i32> for Claim {
    fn from(value: i32) -> Self {
        Claim::Integer(value.into())
    }
}

impl From<u32> for Claim {
    fn from(value: u32) -> Self {
        Claim::Integer(value.into())
    }
}

impl From<f64> for Claim {
    fn from(value: f64) -> Self {
        Claim::Float(value)
    }
}

impl From<bool> for Claim {
    fn from(value: bool) -> Self {
        Claim::Bool(value)
    }
}

impl From<Vec<String>> for Claim {
    fn from(values: Vec<String>) -> Self {
        Claim::List(values)
    }
}

impl From<&[&str]> for Claim {
    fn from(values: &[&str]) -> Self {
        Claim::List(values.iter().map(|value| (*value).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Claim {
    fn from(values: [&str; N]) -> Self {
        Claim::from(&values[..])
    }
}

impl From<Value> for Claim {
    fn from(value: Value) -> Self {
        Claim::Json(value)
    }
}

/// The payload of a token: claim names mapped to values.
///
/// Claims are encoded in insertion order as compact JSON, so building the
/// same set in the same order always yields the same payload bytes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Claims {
    entries: Vec<(String, Claim)>,
}

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`. An existing claim keeps its position and has
    /// its value replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Claim>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    /// Builder form of [`insert`][Self::insert].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Claim>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Claim> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Claim)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Builds a claim set from a JSON object. Members are taken in the
    /// object's iteration order, which for `serde_json::Map` is sorted by key.
    pub fn from_value(value: Value) -> Result<Self, TokenError> {
        let Value::Object(members) = value else {
            return Err(TokenError::Encoding(serde_json::Error::custom(
                "claims must be a JSON object",
            )));
        };
        let entries = members
            .into_iter()
            .map(|(name, value)| (name, Claim::Json(value)))
            .collect();
        Ok(Self { entries })
    }

    pub fn to_value(&self) -> Result<Value, TokenError> {
        Ok(serde_json::to_value(self)?)
    }
}

impl Serialize for Claims {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
