//! Attribute-keyed metric storage.
//!
//! Recording enters through the writable traits; readers pull points out
//! through [`CollectableMetricStorage`]. Multi storages fan one measurement
//! out to every child storage (one child per reader and view).

pub mod async_storage;
pub mod attributes_processor;
pub mod multi;
pub mod sync_storage;

pub use async_storage::AsyncMetricStorage;
pub use attributes_processor::{
    AttributesProcessor, DefaultAttributesProcessor, FilteringAttributesProcessor,
};
pub use multi::{AsyncMultiMetricStorage, SyncMultiMetricStorage};
pub use sync_storage::SyncMetricStorage;

use crate::core::{MetricAttributes, Temporality};
use crate::metrics::aggregation::Aggregation;
use crate::metrics::data::MetricData;
use once_cell::sync::Lazy;
use opentelemetry::Context;
use std::collections::HashMap;
use std::time::SystemTime;

/// One batch of asynchronous measurements, keyed by attribute set.
pub type Measurements<T> = HashMap<MetricAttributes, T, ahash::RandomState>;

/// Aggregations keyed by attribute set.
pub(crate) type AggregationMap =
    HashMap<MetricAttributes, Box<dyn Aggregation>, ahash::RandomState>;

/// Series that absorbs measurements past the cardinality limit.
pub static OVERFLOW_ATTRIBUTES: Lazy<MetricAttributes> =
    Lazy::new(|| MetricAttributes::new().with("otel.metric.overflow", true));

/// Storage written by synchronous instruments.
///
/// None of these calls may fail or panic into the caller: they sit on the
/// application's measurement hot path.
pub trait SyncWritableMetricStorage: Send + Sync {
    /// Record a long with an empty attribute set.
    fn record_long(&self, value: i64, context: &Context);

    /// Record a long for `attributes`.
    fn record_long_with_attributes(
        &self,
        value: i64,
        attributes: &MetricAttributes,
        context: &Context,
    );

    /// Record a double with an empty attribute set.
    fn record_double(&self, value: f64, context: &Context);

    /// Record a double for `attributes`.
    fn record_double_with_attributes(
        &self,
        value: f64,
        attributes: &MetricAttributes,
        context: &Context,
    );
}

/// Storage written by observer callbacks, one batch per callback per cycle.
pub trait AsyncWritableMetricStorage: Send + Sync {
    /// Commit a batch of long observations.
    fn record_long(&self, measurements: &Measurements<i64>, observation_time: SystemTime);

    /// Commit a batch of double observations.
    fn record_double(&self, measurements: &Measurements<f64>, observation_time: SystemTime);
}

/// Storage a reader can pull points from.
pub trait CollectableMetricStorage: Send + Sync {
    /// Points for every attribute set, expressed in `temporality`.
    fn collect(&self, temporality: Temporality, collection_ts: SystemTime) -> MetricData;
}

/// Whether a map holding `len` series has no room for another regular one.
///
/// The overflow series counts toward `limit`, so at most `limit - 1`
/// regular series are admitted.
pub(crate) fn at_cardinality_limit(len: usize, has_overflow: bool, limit: usize) -> bool {
    let regular = len.saturating_sub(usize::from(has_overflow));
    regular.saturating_add(1) >= limit
}
