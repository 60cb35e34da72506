//! Typed driver flags
//!
//! Driver parameters arrive as a map of named values. Drivers read them
//! through the typed accessors; a missing key or a value of another type
//! reads as the zero value for the requested type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single driver flag value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    String(String),
    StringSlice(Vec<String>),
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        FlagValue::String(value.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        FlagValue::String(value)
    }
}

impl From<Vec<String>> for FlagValue {
    fn from(value: Vec<String>) -> Self {
        FlagValue::StringSlice(value)
    }
}

impl From<i64> for FlagValue {
    fn from(value: i64) -> Self {
        FlagValue::Int(value)
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Bool(value)
    }
}

/// Named driver parameters handed to `Driver::set_config_from_flags`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverFlags {
    values: BTreeMap<String, FlagValue>,
}

impl DriverFlags {
    /// Create an empty flag set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set a flag
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a flag, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FlagValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Raw access to a flag
    pub fn get(&self, key: &str) -> Option<&FlagValue> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn string(&self, key: &str) -> String {
        match self.values.get(key) {
            Some(FlagValue::String(s)) => s.clone(),
            _ => String::new(),
        }
    }

    pub fn string_slice(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(FlagValue::StringSlice(v)) => v.clone(),
            _ => Vec::new(),
        }
    }

    pub fn int(&self, key: &str) -> i64 {
        match self.values.get(key) {
            Some(FlagValue::Int(i)) => *i,
            _ => 0,
        }
    }

    pub fn bool(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(FlagValue::Bool(true)))
    }
}

impl<K: Into<String>, V: Into<FlagValue>> FromIterator<(K, V)> for DriverFlags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut flags = DriverFlags::new();
        for (key, value) in iter {
            flags.insert(key, value);
        }
        flags
    }
}
