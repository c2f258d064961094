//! Storage for synchronous instruments.

use super::{
    at_cardinality_limit, AggregationMap, AttributesProcessor, CollectableMetricStorage,
    DefaultAttributesProcessor, SyncWritableMetricStorage, OVERFLOW_ATTRIBUTES,
};
use crate::core::{AggregationType, InstrumentDescriptor, MetricAttributes, Temporality};
use crate::metrics::aggregation::{Aggregation, AggregationConfig, DefaultAggregation};
use crate::metrics::data::{MetricData, PointDataAttributes};
use crate::metrics::types::MetricValue;
use dashmap::DashMap;
use opentelemetry::Context;
use parking_lot::Mutex;
use std::borrow::Cow;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Per-attribute-set aggregations for one reader/view.
///
/// Recording only touches the shard of the sharded map that owns the
/// attribute set. Collection drains the map, so every measurement lands in
/// exactly one collection.
pub struct SyncMetricStorage {
    descriptor: InstrumentDescriptor,
    aggregation_type: AggregationType,
    aggregation_config: Option<AggregationConfig>,
    processor: Arc<dyn AttributesProcessor>,
    cardinality_limit: usize,
    /// Aggregations since the previous collection
    current: DashMap<MetricAttributes, Box<dyn Aggregation>, ahash::RandomState>,
    state: Mutex<CollectionState>,
    overflow_logged: AtomicBool,
}

struct CollectionState {
    /// Running totals, only used for cumulative collection
    cumulative: AggregationMap,
    start_ts: SystemTime,
    last_collection_ts: SystemTime,
}

impl SyncMetricStorage {
    /// Storage for `descriptor`; `Default` resolves to the instrument's family.
    pub fn new(descriptor: InstrumentDescriptor, aggregation_type: AggregationType) -> Self {
        let aggregation_type = DefaultAggregation::resolve(aggregation_type, &descriptor);
        tracing::debug!("Created sync storage for {} with {:?} aggregation", descriptor, aggregation_type);
        let now = SystemTime::now();

        Self {
            descriptor,
            aggregation_type,
            aggregation_config: None,
            processor: Arc::new(DefaultAttributesProcessor),
            cardinality_limit: usize::MAX,
            current: DashMap::with_hasher(ahash::RandomState::new()),
            state: Mutex::new(CollectionState {
                cumulative: AggregationMap::default(),
                start_ts: now,
                last_collection_ts: now,
            }),
            overflow_logged: AtomicBool::new(false),
        }
    }

    /// Configuration passed to every aggregation this storage creates.
    #[must_use]
    pub fn with_aggregation_config(mut self, config: AggregationConfig) -> Self {
        self.aggregation_config = Some(config);
        self
    }

    /// Rewrite attributes before keying.
    #[must_use]
    pub fn with_attributes_processor(mut self, processor: Arc<dyn AttributesProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// Cap the number of attribute sets, overflow series included.
    #[must_use]
    pub fn with_cardinality_limit(mut self, limit: usize) -> Self {
        self.cardinality_limit = limit.max(1);
        self
    }

    /// Instrument this storage belongs to.
    pub fn descriptor(&self) -> &InstrumentDescriptor {
        &self.descriptor
    }

    /// Resolved aggregation family.
    pub fn aggregation_type(&self) -> AggregationType {
        self.aggregation_type
    }

    /// Attribute sets recorded since the previous collection.
    pub fn active_series(&self) -> usize {
        self.current.len()
    }

    /// Route `value` to the aggregation for `attributes`, creating it on first use.
    pub fn record(&self, value: MetricValue, attributes: &MetricAttributes) {
        if self.aggregation_type == AggregationType::Drop {
            return;
        }

        let attributes = self.processor.process(attributes);
        if let Some(mut aggregation) = self.current.get_mut(&*attributes) {
            aggregation.aggregate(value);
            return;
        }

        let key = self.admit(attributes);
        self.current
            .entry(key)
            .or_insert_with(|| self.new_aggregation())
            .aggregate(value);
    }

    fn admit(&self, attributes: Cow<'_, MetricAttributes>) -> MetricAttributes {
        let has_overflow = self.current.contains_key(&*OVERFLOW_ATTRIBUTES);
        if at_cardinality_limit(self.current.len(), has_overflow, self.cardinality_limit) {
            self.log_overflow();
            OVERFLOW_ATTRIBUTES.clone()
        } else {
            attributes.into_owned()
        }
    }

    fn new_aggregation(&self) -> Box<dyn Aggregation> {
        DefaultAggregation::create_aggregation_of_type(
            self.aggregation_type,
            &self.descriptor,
            self.aggregation_config.as_ref(),
        )
    }

    fn log_overflow(&self) {
        if !self.overflow_logged.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                "Cardinality limit {} reached for {}; folding new attribute sets into the overflow series",
                self.cardinality_limit,
                self.descriptor.name
            );
        }
    }

    fn drain_current(&self) -> Vec<(MetricAttributes, Box<dyn Aggregation>)> {
        let keys: Vec<MetricAttributes> = self.current.iter().map(|entry| entry.key().clone()).collect();
        keys.into_iter()
            .filter_map(|key| self.current.remove(&key))
            .collect()
    }
}

impl CollectionState {
    fn fold(&mut self, attributes: MetricAttributes, delta: Box<dyn Aggregation>, limit: usize) -> bool {
        let has_overflow = self.cumulative.contains_key(&*OVERFLOW_ATTRIBUTES);
        let overflowed = !self.cumulative.contains_key(&attributes)
            && at_cardinality_limit(self.cumulative.len(), has_overflow, limit);
        let key = if overflowed { OVERFLOW_ATTRIBUTES.clone() } else { attributes };

        match self.cumulative.entry(key) {
            Entry::Occupied(mut entry) => {
                let merged = entry.get().merge(delta.as_ref());
                entry.insert(merged);
            },
            Entry::Vacant(entry) => {
                entry.insert(delta);
            },
        }
        overflowed
    }
}

impl SyncWritableMetricStorage for SyncMetricStorage {
    fn record_long(&self, value: i64, _context: &Context) {
        self.record(MetricValue::Long(value), &MetricAttributes::new());
    }

    fn record_long_with_attributes(
        &self,
        value: i64,
        attributes: &MetricAttributes,
        _context: &Context,
    ) {
        self.record(MetricValue::Long(value), attributes);
    }

    fn record_double(&self, value: f64, _context: &Context) {
        self.record(MetricValue::Double(value), &MetricAttributes::new());
    }

    fn record_double_with_attributes(
        &self,
        value: f64,
        attributes: &MetricAttributes,
        _context: &Context,
    ) {
        self.record(MetricValue::Double(value), attributes);
    }
}

impl CollectableMetricStorage for SyncMetricStorage {
    fn collect(&self, temporality: Temporality, collection_ts: SystemTime) -> MetricData {
        let mut state = self.state.lock();
        let delta = self.drain_current();

        let (start_ts, points) = match temporality {
            Temporality::Delta => {
                let points = delta
                    .into_iter()
                    .map(|(attributes, aggregation)| PointDataAttributes {
                        point: aggregation.to_point(),
                        attributes,
                    })
                    .collect();
                (state.last_collection_ts, points)
            },
            Temporality::Cumulative => {
                for (attributes, aggregation) in delta {
                    if state.fold(attributes, aggregation, self.cardinality_limit) {
                        self.log_overflow();
                    }
                }
                let points = state
                    .cumulative
                    .iter()
                    .map(|(attributes, aggregation)| PointDataAttributes {
                        attributes: attributes.clone(),
                        point: aggregation.to_point(),
                    })
                    .collect();
                (state.start_ts, points)
            },
        };
        state.last_collection_ts = collection_ts;

        MetricData {
            descriptor: self.descriptor.clone(),
            temporality,
            start_ts,
            end_ts: collection_ts,
            points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{InstrumentType, InstrumentValueType};
    use crate::metrics::aggregation::HistogramAggregationConfig;
    use crate::metrics::storage::FilteringAttributesProcessor;
    use std::thread;

    fn counter(value_type: InstrumentValueType) -> SyncMetricStorage {
        SyncMetricStorage::new(
            InstrumentDescriptor::new("requests", InstrumentType::Counter, value_type),
            AggregationType::Default,
        )
    }

    fn sum_of(data: &MetricData, attributes: &MetricAttributes) -> Option<MetricValue> {
        data.point(attributes).and_then(|p| p.as_sum()).map(|s| s.value)
    }

    #[test]
    fn test_counter_sums_per_attribute_set() {
        let storage = counter(InstrumentValueType::Long);
        let get = MetricAttributes::from([("method", "GET")]);
        let post = MetricAttributes::from([("method", "POST")]);
        let cx = Context::new();

        storage.record_long_with_attributes(3, &get, &cx);
        storage.record_long_with_attributes(5, &get, &cx);
        storage.record_long_with_attributes(-2, &get, &cx);
        storage.record_long_with_attributes(1, &post, &cx);
        storage.record_long(10, &cx);

        let data = storage.collect(Temporality::Cumulative, SystemTime::now());
        assert_eq!(data.points.len(), 3);
        assert_eq!(sum_of(&data, &get), Some(MetricValue::Long(6)));
        assert_eq!(sum_of(&data, &post), Some(MetricValue::Long(1)));
        assert_eq!(sum_of(&data, &MetricAttributes::new()), Some(MetricValue::Long(10)));
    }

    #[test]
    fn test_cumulative_keeps_running_total() {
        let storage = counter(InstrumentValueType::Double);
        let cx = Context::new();

        storage.record_double(1.5, &cx);
        let first = storage.collect(Temporality::Cumulative, SystemTime::now());
        storage.record_double(2.0, &cx);
        let second = storage.collect(Temporality::Cumulative, SystemTime::now());
        let third = storage.collect(Temporality::Cumulative, SystemTime::now());

        let empty = MetricAttributes::new();
        assert_eq!(sum_of(&first, &empty), Some(MetricValue::Double(1.5)));
        assert_eq!(sum_of(&second, &empty), Some(MetricValue::Double(3.5)));
        assert_eq!(sum_of(&third, &empty), Some(MetricValue::Double(3.5)));
        assert_eq!(first.start_ts, third.start_ts);
    }

    #[test]
    fn test_delta_resets_each_collection() {
        let storage = counter(InstrumentValueType::Long);
        let cx = Context::new();

        storage.record_long(4, &cx);
        let first = storage.collect(Temporality::Delta, SystemTime::now());
        let second = storage.collect(Temporality::Delta, SystemTime::now());
        storage.record_long(6, &cx);
        let third = storage.collect(Temporality::Delta, SystemTime::now());

        let empty = MetricAttributes::new();
        assert_eq!(sum_of(&first, &empty), Some(MetricValue::Long(4)));
        assert!(second.points.is_empty());
        assert_eq!(sum_of(&third, &empty), Some(MetricValue::Long(6)));
        assert_eq!(third.start_ts, second.end_ts);
    }

    #[test]
    fn test_histogram_storage_uses_config() {
        let storage = SyncMetricStorage::new(
            InstrumentDescriptor::new("latency", InstrumentType::Histogram, InstrumentValueType::Double),
            AggregationType::Default,
        )
        .with_aggregation_config(AggregationConfig::from(HistogramAggregationConfig {
            boundaries: vec![10.0],
            record_min_max: true,
        }));
        let cx = Context::new();
        storage.record_double(5.0, &cx);
        storage.record_double(50.0, &cx);

        let data = storage.collect(Temporality::Delta, SystemTime::now());
        let point = data.point(&MetricAttributes::new()).unwrap().as_histogram().unwrap().clone();
        assert_eq!(point.counts, vec![1, 1]);
    }

    #[test]
    fn test_drop_storage_records_nothing() {
        let storage = SyncMetricStorage::new(
            InstrumentDescriptor::new("ignored", InstrumentType::Counter, InstrumentValueType::Long),
            AggregationType::Drop,
        );
        storage.record_long(1, &Context::new());

        assert_eq!(storage.active_series(), 0);
        assert!(storage.collect(Temporality::Cumulative, SystemTime::now()).points.is_empty());
    }

    #[test]
    fn test_attribute_filtering_merges_series() {
        let storage = counter(InstrumentValueType::Long)
            .with_attributes_processor(Arc::new(FilteringAttributesProcessor::new(["route"])));
        let cx = Context::new();

        storage.record_long_with_attributes(1, &MetricAttributes::from([("route", "/a"), ("user", "x")]), &cx);
        storage.record_long_with_attributes(2, &MetricAttributes::from([("route", "/a"), ("user", "y")]), &cx);

        let data = storage.collect(Temporality::Cumulative, SystemTime::now());
        assert_eq!(data.points.len(), 1);
        assert_eq!(sum_of(&data, &MetricAttributes::from([("route", "/a")])), Some(MetricValue::Long(3)));
    }

    #[test]
    fn test_cardinality_limit_folds_into_overflow() {
        let storage = counter(InstrumentValueType::Long).with_cardinality_limit(3);
        let cx = Context::new();

        for shard in 0..5_i64 {
            storage.record_long_with_attributes(1, &MetricAttributes::new().with("shard", shard), &cx);
        }

        let data = storage.collect(Temporality::Cumulative, SystemTime::now());
        assert_eq!(data.points.len(), 3);
        assert_eq!(sum_of(&data, &OVERFLOW_ATTRIBUTES), Some(MetricValue::Long(3)));
    }

    #[test]
    fn test_concurrent_recording_loses_nothing() {
        let storage = Arc::new(counter(InstrumentValueType::Long));
        let attributes = MetricAttributes::from([("worker", "pool")]);

        thread::scope(|scope| {
            for _ in 0..8 {
                let storage = Arc::clone(&storage);
                let attributes = attributes.clone();
                scope.spawn(move || {
                    let cx = Context::new();
                    for _ in 0..1000 {
                        storage.record_long_with_attributes(1, &attributes, &cx);
                    }
                });
            }
        });

        let data = storage.collect(Temporality::Cumulative, SystemTime::now());
        assert_eq!(sum_of(&data, &attributes), Some(MetricValue::Long(8000)));
    }
}
