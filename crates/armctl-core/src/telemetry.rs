//! Key/value telemetry
//!
//! Components push their observations into a [`TelemetrySink`] at most once
//! per tick. Nothing is acknowledged; the latest value per key wins.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A published telemetry value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Number(f64),
    Boolean(bool),
    String(String),
}

/// Destination for telemetry
pub trait TelemetrySink {
    /// Publish a number
    fn put_number(&mut self, key: &str, value: f64);

    /// Publish a boolean
    fn put_boolean(&mut self, key: &str, value: bool);

    /// Publish a string
    fn put_string(&mut self, key: &str, value: &str);
}

/// In-memory telemetry table
///
/// Cloning yields another handle to the same table, so a dashboard thread
/// can read what the control loop publishes.
#[derive(Debug, Clone, Default)]
pub struct TelemetryTable {
    name: Arc<str>,
    entries: Arc<RwLock<HashMap<String, TelemetryValue>>>,
}

impl TelemetryTable {
    /// Create an empty table
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latest value for `key`
    pub fn get(&self, key: &str) -> Option<TelemetryValue> {
        self.entries.read().get(key).cloned()
    }

    /// Latest number for `key`, or `default`
    pub fn get_number(&self, key: &str, default: f64) -> f64 {
        match self.get(key) {
            Some(TelemetryValue::Number(value)) => value,
            _ => default,
        }
    }

    /// Latest boolean for `key`, or `default`
    pub fn get_boolean(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(TelemetryValue::Boolean(value)) => value,
            _ => default,
        }
    }

    /// Latest string for `key`, or `default`
    pub fn get_string(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(TelemetryValue::String(value)) => value,
            _ => default.to_string(),
        }
    }

    /// Copy of every entry
    pub fn snapshot(&self) -> HashMap<String, TelemetryValue> {
        self.entries.read().clone()
    }

    /// Number of keys published
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been published
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    #[inline]
    fn put(&self, key: &str, value: TelemetryValue) {
        self.entries.write().insert(key.to_string(), value);
    }
}

impl TelemetrySink for TelemetryTable {
    fn put_number(&mut self, key: &str, value: f64) {
        self.put(key, TelemetryValue::Number(value));
    }

    fn put_boolean(&mut self, key: &str, value: bool) {
        self.put(key, TelemetryValue::Boolean(value));
    }

    fn put_string(&mut self, key: &str, value: &str) {
        self.put(key, TelemetryValue::String(value.to_string()));
    }
}
