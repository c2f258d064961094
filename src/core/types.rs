//! Instrument identity and aggregation selection types.
//!
//! These are produced by the instrument layer and consumed, read-only, by the
//! aggregation factory and the metric storages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of instrument that produced a measurement stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentType {
    /// Synchronous monotonic sum
    Counter,
    /// Synchronous non-monotonic sum
    UpDownCounter,
    /// Synchronous distribution of values
    Histogram,
    /// Asynchronous monotonic sum reported by a callback
    ObservableCounter,
    /// Asynchronous non-monotonic sum reported by a callback
    ObservableUpDownCounter,
    /// Asynchronous point-in-time value reported by a callback
    ObservableGauge,
    /// Any kind this SDK does not recognise (e.g. parsed from a newer config)
    #[serde(other)]
    Unknown,
}

impl InstrumentType {
    /// Whether measurements arrive through direct record calls.
    pub fn is_synchronous(self) -> bool {
        matches!(self, Self::Counter | Self::UpDownCounter | Self::Histogram)
    }

    /// Whether measurements arrive through observer callbacks.
    pub fn is_asynchronous(self) -> bool {
        matches!(
            self,
            Self::ObservableCounter | Self::ObservableUpDownCounter | Self::ObservableGauge
        )
    }

    /// Whether the exported sum never decreases.
    pub fn is_monotonic(self) -> bool {
        matches!(self, Self::Counter | Self::ObservableCounter)
    }
}

/// Numeric representation of an instrument's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentValueType {
    /// 64-bit signed integers
    Long,
    /// 64-bit floats
    Double,
}

/// Immutable description of an instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentDescriptor {
    /// Instrument name, used for view matching
    pub name: String,
    /// Human readable description
    pub description: String,
    /// Unit of measure (UCUM)
    pub unit: String,
    /// Instrument kind
    pub instrument_type: InstrumentType,
    /// Numeric kind
    pub value_type: InstrumentValueType,
}

impl InstrumentDescriptor {
    /// Creates a descriptor with an empty description and unit.
    pub fn new(
        name: impl Into<String>,
        instrument_type: InstrumentType,
        value_type: InstrumentValueType,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            unit: String::new(),
            instrument_type,
            value_type,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the unit.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}

impl fmt::Display for InstrumentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}/{:?})", self.name, self.instrument_type, self.value_type)
    }
}

/// Aggregation requested for a stream, orthogonal to the instrument kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationType {
    /// Discard every measurement
    Drop,
    /// Arithmetic sum
    Sum,
    /// Most recent value
    LastValue,
    /// Explicit-bucket histogram
    Histogram,
    /// Whatever the instrument kind selects
    #[default]
    Default,
}

/// Window an exported point covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Temporality {
    /// Everything since the storage was created
    #[default]
    Cumulative,
    /// Only what changed since the previous collection
    Delta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_kind_classification() {
        assert!(InstrumentType::Counter.is_synchronous());
        assert!(InstrumentType::Histogram.is_synchronous());
        assert!(InstrumentType::ObservableGauge.is_asynchronous());
        assert!(!InstrumentType::Unknown.is_synchronous());
        assert!(!InstrumentType::Unknown.is_asynchronous());

        assert!(InstrumentType::Counter.is_monotonic());
        assert!(InstrumentType::ObservableCounter.is_monotonic());
        assert!(!InstrumentType::UpDownCounter.is_monotonic());
    }

    #[test]
    fn test_unknown_instrument_type_from_yaml() {
        let parsed: InstrumentType = serde_yaml::from_str("exponential_gauge").unwrap();
        assert_eq!(parsed, InstrumentType::Unknown);

        let parsed: InstrumentType = serde_yaml::from_str("observable_up_down_counter").unwrap();
        assert_eq!(parsed, InstrumentType::ObservableUpDownCounter);
    }

    #[test]
    fn test_descriptor_builder() {
        let descriptor =
            InstrumentDescriptor::new("http.requests", InstrumentType::Counter, InstrumentValueType::Long)
                .with_description("Inbound requests")
                .with_unit("{request}");

        assert_eq!(descriptor.name, "http.requests");
        assert_eq!(descriptor.unit, "{request}");
        assert_eq!(descriptor.to_string(), "http.requests (Counter/Long)");
    }
}
