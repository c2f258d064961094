//! Measurement sink handed to observer callbacks.

use crate::core::{InstrumentDescriptor, InstrumentValueType, MetricAttributes};
use crate::metrics::storage::{AsyncWritableMetricStorage, Measurements};
use crate::metrics::types::MetricValue;
use std::time::SystemTime;

#[derive(Debug)]
enum ObservedBatch {
    Long(Measurements<i64>),
    Double(Measurements<f64>),
}

/// Collects what one callback reports during one collection cycle.
///
/// The batch is committed to the instrument's storage only after the
/// callback returns successfully. Reporting the same attribute set twice
/// keeps the later value.
#[derive(Debug)]
pub struct ObserverResult {
    instrument: String,
    batch: ObservedBatch,
}

impl ObserverResult {
    /// Empty result for an instrument of `descriptor`'s value type.
    pub fn new(descriptor: &InstrumentDescriptor) -> Self {
        let batch = match descriptor.value_type {
            InstrumentValueType::Long => ObservedBatch::Long(Measurements::default()),
            InstrumentValueType::Double => ObservedBatch::Double(Measurements::default()),
        };
        Self {
            instrument: descriptor.name.clone(),
            batch,
        }
    }

    /// Report a long measurement.
    ///
    /// # Panics
    ///
    /// Panics when the instrument observes doubles.
    pub fn observe_long(&mut self, value: i64, attributes: &MetricAttributes) {
        match &mut self.batch {
            ObservedBatch::Long(measurements) => {
                measurements.insert(attributes.clone(), value);
            },
            ObservedBatch::Double(_) => {
                panic!("cannot observe a long value on double instrument {}", self.instrument)
            },
        }
    }

    /// Report a double measurement.
    ///
    /// # Panics
    ///
    /// Panics when the instrument observes longs.
    pub fn observe_double(&mut self, value: f64, attributes: &MetricAttributes) {
        match &mut self.batch {
            ObservedBatch::Double(measurements) => {
                measurements.insert(attributes.clone(), value);
            },
            ObservedBatch::Long(_) => {
                panic!("cannot observe a double value on long instrument {}", self.instrument)
            },
        }
    }

    /// Report a measurement of either kind; it must match the instrument.
    pub fn observe(&mut self, value: impl Into<MetricValue>, attributes: &MetricAttributes) {
        match value.into() {
            MetricValue::Long(value) => self.observe_long(value, attributes),
            MetricValue::Double(value) => self.observe_double(value, attributes),
        }
    }

    /// Name of the instrument being observed.
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Number of distinct attribute sets reported.
    pub fn len(&self) -> usize {
        match &self.batch {
            ObservedBatch::Long(measurements) => measurements.len(),
            ObservedBatch::Double(measurements) => measurements.len(),
        }
    }

    /// Whether nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the batch into `storage`, stamped with `observation_time`.
    pub(crate) fn commit(self, storage: &dyn AsyncWritableMetricStorage, observation_time: SystemTime) {
        match &self.batch {
            ObservedBatch::Long(measurements) => storage.record_long(measurements, observation_time),
            ObservedBatch::Double(measurements) => storage.record_double(measurements, observation_time),
        }
    }
}
