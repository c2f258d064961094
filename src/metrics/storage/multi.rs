//! Fan-out storages: one instrument, many reader/view storages.

use super::{AsyncWritableMetricStorage, Measurements, SyncWritableMetricStorage};
use crate::core::MetricAttributes;
use opentelemetry::Context;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::SystemTime;

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `write` against one child, keeping a panicking child from
/// starving the ones after it.
fn isolated<F: FnOnce()>(index: usize, write: F) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(write)) {
        tracing::error!(
            "Metric storage #{} panicked while recording: {}",
            index,
            panic_message(payload.as_ref())
        );
    }
}

/// Forwards every synchronous measurement to each child in order.
#[derive(Default)]
pub struct SyncMultiMetricStorage {
    storages: Vec<Arc<dyn SyncWritableMetricStorage>>,
}

impl SyncMultiMetricStorage {
    /// Empty fan-out; recording is a no-op until a child is added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child storage.
    pub fn add_storage(&mut self, storage: Arc<dyn SyncWritableMetricStorage>) {
        self.storages.push(storage);
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.storages.len()
    }

    /// Whether there are no children.
    pub fn is_empty(&self) -> bool {
        self.storages.is_empty()
    }
}

impl fmt::Debug for SyncMultiMetricStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncMultiMetricStorage")
            .field("storages", &self.storages.len())
            .finish()
    }
}

impl SyncWritableMetricStorage for SyncMultiMetricStorage {
    fn record_long(&self, value: i64, context: &Context) {
        for (index, storage) in self.storages.iter().enumerate() {
            isolated(index, || storage.record_long(value, context));
        }
    }

    fn record_long_with_attributes(
        &self,
        value: i64,
        attributes: &MetricAttributes,
        context: &Context,
    ) {
        for (index, storage) in self.storages.iter().enumerate() {
            isolated(index, || storage.record_long_with_attributes(value, attributes, context));
        }
    }

    fn record_double(&self, value: f64, context: &Context) {
        for (index, storage) in self.storages.iter().enumerate() {
            isolated(index, || storage.record_double(value, context));
        }
    }

    fn record_double_with_attributes(
        &self,
        value: f64,
        attributes: &MetricAttributes,
        context: &Context,
    ) {
        for (index, storage) in self.storages.iter().enumerate() {
            isolated(index, || storage.record_double_with_attributes(value, attributes, context));
        }
    }
}

/// Forwards every observed batch to each child in order.
#[derive(Default)]
pub struct AsyncMultiMetricStorage {
    storages: Vec<Arc<dyn AsyncWritableMetricStorage>>,
}

impl AsyncMultiMetricStorage {
    /// Empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child storage.
    pub fn add_storage(&mut self, storage: Arc<dyn AsyncWritableMetricStorage>) {
        self.storages.push(storage);
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.storages.len()
    }

    /// Whether there are no children.
    pub fn is_empty(&self) -> bool {
        self.storages.is_empty()
    }
}

impl fmt::Debug for AsyncMultiMetricStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncMultiMetricStorage")
            .field("storages", &self.storages.len())
            .finish()
    }
}

impl AsyncWritableMetricStorage for AsyncMultiMetricStorage {
    fn record_long(&self, measurements: &Measurements<i64>, observation_time: SystemTime) {
        for (index, storage) in self.storages.iter().enumerate() {
            isolated(index, || storage.record_long(measurements, observation_time));
        }
    }

    fn record_double(&self, measurements: &Measurements<f64>, observation_time: SystemTime) {
        for (index, storage) in self.storages.iter().enumerate() {
            isolated(index, || storage.record_double(measurements, observation_time));
        }
    }
}
