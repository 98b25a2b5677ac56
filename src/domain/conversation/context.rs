//! Conversational context accumulated across turns.
//!
//! The context is an open string-keyed map, but the keys that completion
//! checks and persistence triggers depend on are named by [`WellKnownKey`]
//! so the spelling lives in one place.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::foundation::Timestamp;

/// Context keys with fixed meaning across the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownKey {
    Name,
    Email,
    ProductChoice,
}

impl WellKnownKey {
    /// All well-known keys.
    pub const ALL: [WellKnownKey; 3] = [
        WellKnownKey::Name,
        WellKnownKey::Email,
        WellKnownKey::ProductChoice,
    ];

    /// The key as stored in the context map.
    pub fn as_str(&self) -> &'static str {
        match self {
            WellKnownKey::Name => "name",
            WellKnownKey::Email => "email",
            WellKnownKey::ProductChoice => "productChoice",
        }
    }

    /// Looks up a well-known key by its stored spelling.
    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

impl fmt::Display for WellKnownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged context value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ContextValue {
    Text(String),
    Number(f64),
    Flag(bool),
    Timestamp(Timestamp),
    Structured(JsonValue),
}

impl ContextValue {
    /// Creates a text value.
    pub fn text(value: impl Into<String>) -> Self {
        ContextValue::Text(value.into())
    }

    /// Converts an untyped JSON value from the oracle.
    ///
    /// `null` carries no information and yields `None`, so it can never
    /// overwrite a previously captured value.
    pub fn from_json(value: JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => None,
            JsonValue::Bool(b) => Some(ContextValue::Flag(b)),
            JsonValue::Number(n) => n.as_f64().map(ContextValue::Number),
            JsonValue::String(s) => Some(ContextValue::Text(s)),
            other => Some(ContextValue::Structured(other)),
        }
    }

    /// Plain JSON rendering used in prompts and persistence payloads.
    pub fn to_json(&self) -> JsonValue {
        match self {
            ContextValue::Text(s) => JsonValue::String(s.clone()),
            ContextValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            ContextValue::Flag(b) => JsonValue::Bool(*b),
            ContextValue::Timestamp(ts) => JsonValue::String(ts.to_rfc3339()),
            ContextValue::Structured(v) => v.clone(),
        }
    }

    /// Returns the text if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContextValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// A value is blank when it is empty or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        matches!(self, ContextValue::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Text(s) => f.write_str(s),
            ContextValue::Number(n) => write!(f, "{}", n),
            ContextValue::Flag(b) => write!(f, "{}", b),
            ContextValue::Timestamp(ts) => f.write_str(&ts.to_rfc3339()),
            ContextValue::Structured(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for ContextValue {
    fn from(s: &str) -> Self {
        ContextValue::Text(s.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(s: String) -> Self {
        ContextValue::Text(s)
    }
}

/// Accumulated conversational context.
///
/// Keys are never removed by the engine; merging is a right-biased union.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(BTreeMap<String, ContextValue>);

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from an untyped JSON object, dropping nulls.
    pub fn from_json_object(map: serde_json::Map<String, JsonValue>) -> Self {
        Self(
            map.into_iter()
                .filter_map(|(k, v)| ContextValue::from_json(v).map(|v| (k, v)))
                .collect(),
        )
    }

    /// Inserts or overwrites a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Inserts a value under a well-known key.
    pub fn insert_known(&mut self, key: WellKnownKey, value: impl Into<ContextValue>) {
        self.insert(key.as_str(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.0.get(key)
    }

    pub fn get_known(&self, key: WellKnownKey) -> Option<&ContextValue> {
        self.get(key.as_str())
    }

    /// Text value of a key, if present and textual.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ContextValue::as_text)
    }

    /// True when the key holds a non-blank value.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_blank())
    }

    pub fn has_known(&self, key: WellKnownKey) -> bool {
        self.has(key.as_str())
    }

    /// True when every listed key holds a non-blank value.
    pub fn has_all<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> bool {
        keys.into_iter().all(|k| self.has(k))
    }

    /// Right-biased union: keys in `newer` win on collision.
    pub fn merged_with(&self, newer: &Context) -> Context {
        let mut merged = self.0.clone();
        for (key, value) in &newer.0 {
            merged.insert(key.clone(), value.clone());
        }
        Context(merged)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Plain JSON object rendering.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, ContextValue)> for Context {
    fn from_iter<I: IntoIterator<Item = (String, ContextValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
