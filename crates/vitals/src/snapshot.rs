//! Snapshot boundary types consumed by reporters.
//!
//! A registry snapshot maps each metric identity to an [`InstrumentFields`]
//! payload: the identity's tags, a field map per instrument kind, and any
//! drained event points. Field values carry an integer/float discriminant so
//! wire encoders that distinguish the two (e.g. InfluxDB line protocol) can
//! serialize integers as strict integer literals.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single snapshot field value.
///
/// `Int` is the integer-marked variant: line-protocol encoders emit it with
/// the `i` suffix. Counts are `Int`; rates and distribution statistics are
/// `Float`; gauges may expose any variant.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FieldValue {
    /// Integer-marked value; serialized as a strict integer literal.
    Int(i64),
    /// Plain floating-point value.
    Float(f64),
    /// Text value; quoted by line-oriented encoders.
    Text(String),
}

impl FieldValue {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One timestamped, field-tagged occurrence in an event log.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventPoint {
    /// Seconds since the UNIX epoch when the point was recorded.
    pub time_secs: f64,
    /// Field values attached to the occurrence.
    pub fields: BTreeMap<String, FieldValue>,
}

/// Snapshot payload for one instrument.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InstrumentFields {
    /// The identity's tag mapping, echoed for sink consumption.
    pub tags: BTreeMap<String, String>,
    /// Field mapping per instrument kind (see the snapshot contract).
    pub fields: BTreeMap<String, FieldValue>,
    /// Event points drained from an event log; empty for other kinds.
    pub events: Vec<EventPoint>,
}

impl InstrumentFields {
    pub(crate) fn with_tags(tags: BTreeMap<String, String>) -> Self {
        Self { tags, fields: BTreeMap::new(), events: Vec::new() }
    }

    pub(crate) fn field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for snapshot boundary types.
    use super::*;

    #[test]
    fn test_field_value_conversions() {
        assert_eq!(FieldValue::from(42i64), FieldValue::Int(42));
        assert_eq!(FieldValue::from(0.5f64), FieldValue::Float(0.5));
        assert_eq!(FieldValue::from("up"), FieldValue::Text("up".to_string()));
    }

    #[test]
    fn test_field_value_as_f64() {
        assert_eq!(FieldValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(FieldValue::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(FieldValue::Text("x".to_string()).as_f64(), None);
    }

    /// Validates the untagged wire shape of field values.
    #[cfg(feature = "serde")]
    #[test]
    fn test_field_value_serializes_untagged() {
        let int = serde_json::to_string(&FieldValue::Int(3)).expect("serialize int");
        assert_eq!(int, "3");
        let float = serde_json::to_string(&FieldValue::Float(0.5)).expect("serialize float");
        assert_eq!(float, "0.5");
        let text = serde_json::to_string(&FieldValue::Text("up".into())).expect("serialize text");
        assert_eq!(text, "\"up\"");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_event_point_round_trips() {
        let mut fields = BTreeMap::new();
        fields.insert("build".to_string(), FieldValue::Int(17));
        let point = EventPoint { time_secs: 30.0, fields };

        let json = serde_json::to_string(&point).expect("serialize point");
        let back: EventPoint = serde_json::from_str(&json).expect("deserialize point");
        assert_eq!(back, point);
    }

    #[test]
    fn test_instrument_fields_builder() {
        let mut tags = BTreeMap::new();
        tags.insert("host".to_string(), "a1".to_string());

        let fields = InstrumentFields::with_tags(tags).field("count", 3i64).field("rate", 0.25);

        assert_eq!(fields.tags.get("host"), Some(&"a1".to_string()));
        assert_eq!(fields.fields.get("count"), Some(&FieldValue::Int(3)));
        assert_eq!(fields.fields.get("rate"), Some(&FieldValue::Float(0.25)));
        assert!(fields.events.is_empty());
    }
}
