//! Sensor readings and the adapter that resolves identifiers to their latest
//! values.
//!
//! A reading that is missing, unavailable or not numeric is never an error:
//! it resolves to a non-value and the evaluator treats it as "no data".

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::weather::WeatherAttributes;

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadingValue {
    Value(f64),
    Unknown,
    Unavailable,
}

impl ReadingValue {
    /// Parse a raw state string as published by a sensor.
    ///
    /// `unavailable` keeps its own variant; anything else that is not a finite
    /// number (including `unknown`) becomes `Unknown`.
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim();
        if s.eq_ignore_ascii_case("unavailable") {
            return Self::Unavailable;
        }
        match s.parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Value(v),
            _ => Self::Unknown,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Unknown | Self::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: ReadingValue,
    pub unit: Option<String>,
    pub source_id: String,
}

impl Reading {
    pub fn new(source_id: impl Into<String>, value: ReadingValue, unit: Option<String>) -> Self {
        Self {
            value,
            unit,
            source_id: source_id.into(),
        }
    }

    pub fn unknown(source_id: impl Into<String>) -> Self {
        Self::new(source_id, ReadingValue::Unknown, None)
    }

    pub fn value(&self) -> Option<f64> {
        self.value.value()
    }

    pub fn is_known(&self) -> bool {
        self.value().is_some()
    }
}

// ---------------------------------------------------------------------------
// Source references
// ---------------------------------------------------------------------------

/// A logical reading backed by one sensor identifier or by several whose
/// valid values are averaged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceRef {
    One(String),
    Many(Vec<String>),
}

impl SourceRef {
    pub fn ids(&self) -> &[String] {
        match self {
            SourceRef::One(id) => std::slice::from_ref(id),
            SourceRef::Many(ids) => ids,
        }
    }

    pub fn label(&self) -> String {
        self.ids().join(",")
    }
}

impl From<&str> for SourceRef {
    fn from(id: &str) -> Self {
        SourceRef::One(id.to_string())
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Resolves sensor identifiers to their latest readings.
pub trait ReadingSource {
    /// Latest reading for `id`. An identifier nobody has published yet is
    /// `Unknown`, not an error.
    fn get(&self, id: &str) -> Reading;

    /// Weather attributes published under `id`, if any.
    fn weather(&self, _id: &str) -> Option<WeatherAttributes> {
        None
    }

    /// Resolve a logical reading, averaging when it names several sensors.
    fn resolve(&self, source: &SourceRef) -> Reading {
        match source {
            SourceRef::One(id) => self.get(id),
            SourceRef::Many(ids) => average(ids.iter().map(|id| self.get(id)), source.label()),
        }
    }
}

/// Average the valid values of `readings`. The unit comes from the first valid
/// reading that carries one. With no valid value the result is `Unavailable`
/// when every input was unavailable and `Unknown` otherwise.
fn average(readings: impl Iterator<Item = Reading>, source_id: String) -> Reading {
    let mut sum = 0.0;
    let mut count = 0usize;
    let mut unit: Option<String> = None;
    let mut all_unavailable = true;
    let mut seen = 0usize;

    for r in readings {
        seen += 1;
        if r.value != ReadingValue::Unavailable {
            all_unavailable = false;
        }
        if let Some(v) = r.value() {
            sum += v;
            count += 1;
            if unit.is_none() {
                unit = r.unit;
            }
        }
    }

    if count == 0 {
        let value = if seen > 0 && all_unavailable {
            ReadingValue::Unavailable
        } else {
            ReadingValue::Unknown
        };
        return Reading::new(source_id, value, None);
    }

    Reading::new(source_id, ReadingValue::Value(sum / count as f64), unit)
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Latest-value table fed by whatever transport delivers sensor states.
#[derive(Debug, Default, Clone)]
pub struct ReadingStore {
    readings: HashMap<String, Reading>,
    weather: HashMap<String, WeatherAttributes>,
}

impl ReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the raw state for `id`. Returns true when the stored value or
    /// unit changed.
    pub fn update(&mut self, id: &str, raw: &str, unit: Option<String>) -> bool {
        let reading = Reading::new(id, ReadingValue::parse(raw), unit);
        match self.readings.get(id) {
            Some(prev) if *prev == reading => false,
            _ => {
                self.readings.insert(id.to_string(), reading);
                true
            }
        }
    }

    /// Store the weather attributes for `id`. Returns true when they changed.
    pub fn update_weather(&mut self, id: &str, attrs: WeatherAttributes) -> bool {
        if self.weather.get(id) == Some(&attrs) {
            return false;
        }
        self.weather.insert(id.to_string(), attrs);
        true
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

impl ReadingSource for ReadingStore {
    fn get(&self, id: &str) -> Reading {
        self.readings
            .get(id)
            .cloned()
            .unwrap_or_else(|| Reading::unknown(id))
    }

    fn weather(&self, id: &str) -> Option<WeatherAttributes> {
        self.weather.get(id).cloned()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
