//! Common test utilities and fixtures.

#![allow(dead_code)]

use std::time::{Duration, SystemTime};
use urpo_metrics::core::{InstrumentDescriptor, InstrumentType, InstrumentValueType, MetricAttributes};
use urpo_metrics::metrics::{MetricData, MetricValue};

/// Test fixture builder for instrument descriptors with sensible defaults.
pub struct TestInstrumentBuilder {
    name: String,
    instrument_type: InstrumentType,
    value_type: InstrumentValueType,
    unit: String,
}

impl TestInstrumentBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            instrument_type: InstrumentType::Counter,
            value_type: InstrumentValueType::Long,
            unit: "1".to_string(),
        }
    }

    pub fn kind(mut self, instrument_type: InstrumentType) -> Self {
        self.instrument_type = instrument_type;
        self
    }

    pub fn double(mut self) -> Self {
        self.value_type = InstrumentValueType::Double;
        self
    }

    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    pub fn build(self) -> InstrumentDescriptor {
        InstrumentDescriptor::new(self.name, self.instrument_type, self.value_type).with_unit(self.unit)
    }
}

/// Attribute set from string pairs.
pub fn attrs(pairs: &[(&str, &str)]) -> MetricAttributes {
    pairs.iter().map(|(k, v)| (*k, *v)).collect()
}

/// Fixed timestamp `secs` after the epoch.
pub fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

/// Sum reported for `attributes`, if any.
pub fn sum_value(data: &MetricData, attributes: &MetricAttributes) -> Option<MetricValue> {
    data.point(attributes).and_then(|p| p.as_sum()).map(|s| s.value)
}

/// Last value reported for `attributes`, if any.
pub fn last_value(data: &MetricData, attributes: &MetricAttributes) -> Option<MetricValue> {
    data.point(attributes).and_then(|p| p.as_last_value()).map(|p| p.value)
}
