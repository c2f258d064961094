//! Storage for asynchronous (observable) instruments.

use super::{
    at_cardinality_limit, AggregationMap, AsyncWritableMetricStorage, AttributesProcessor,
    CollectableMetricStorage, DefaultAttributesProcessor, Measurements, OVERFLOW_ATTRIBUTES,
};
use crate::core::{AggregationType, InstrumentDescriptor, MetricAttributes, Temporality};
use crate::metrics::aggregation::{Aggregation, AggregationConfig, DefaultAggregation};
use crate::metrics::data::{MetricData, PointDataAttributes};
use crate::metrics::types::MetricValue;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Observed state per attribute set for one reader/view.
///
/// Observations are absolute: a new batch replaces the stored sum or last
/// value for each attribute set it mentions. Histograms are the exception
/// and accumulate every observation. A whole batch is committed under one
/// lock so a collection never sees half a callback's report.
pub struct AsyncMetricStorage {
    descriptor: InstrumentDescriptor,
    aggregation_type: AggregationType,
    aggregation_config: Option<AggregationConfig>,
    processor: Arc<dyn AttributesProcessor>,
    cardinality_limit: usize,
    state: Mutex<ObservedState>,
    overflow_logged: AtomicBool,
}

struct ObservedState {
    observed: AggregationMap,
    /// Snapshot reported by the previous delta collection
    last_reported: AggregationMap,
    /// Attribute sets committed since the previous collection
    touched: HashSet<MetricAttributes, ahash::RandomState>,
    start_ts: SystemTime,
    last_collection_ts: SystemTime,
}

impl AsyncMetricStorage {
    /// Storage for `descriptor`; `Default` resolves to the instrument's family.
    pub fn new(descriptor: InstrumentDescriptor, aggregation_type: AggregationType) -> Self {
        let aggregation_type = DefaultAggregation::resolve(aggregation_type, &descriptor);
        tracing::debug!("Created async storage for {} with {:?} aggregation", descriptor, aggregation_type);
        let now = SystemTime::now();

        Self {
            descriptor,
            aggregation_type,
            aggregation_config: None,
            processor: Arc::new(DefaultAttributesProcessor),
            cardinality_limit: usize::MAX,
            state: Mutex::new(ObservedState {
                observed: AggregationMap::default(),
                last_reported: AggregationMap::default(),
                touched: HashSet::default(),
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

    /// Attribute sets currently retained.
    pub fn observed_series(&self) -> usize {
        self.state.lock().observed.len()
    }

    fn record<'a, I>(&self, measurements: I, observation_time: SystemTime)
    where
        I: IntoIterator<Item = (&'a MetricAttributes, MetricValue)>,
    {
        if self.aggregation_type == AggregationType::Drop {
            return;
        }

        let mut state = self.state.lock();

        // Fold the batch first: attribute sets collapsed by the processor
        // or by the overflow series add up instead of overwriting each other.
        let mut batch = AggregationMap::default();
        let mut new_series = 0_usize;
        for (attributes, value) in measurements {
            let attributes = self.processor.process(attributes);
            let known = state.observed.contains_key(&*attributes)
                || batch.contains_key(&*attributes);
            let has_overflow = state.observed.contains_key(&*OVERFLOW_ATTRIBUTES)
                || batch.contains_key(&*OVERFLOW_ATTRIBUTES);

            let key = if known {
                attributes.into_owned()
            } else if at_cardinality_limit(
                state.observed.len() + new_series,
                has_overflow,
                self.cardinality_limit,
            ) {
                self.log_overflow();
                if !has_overflow {
                    new_series += 1;
                }
                OVERFLOW_ATTRIBUTES.clone()
            } else {
                new_series += 1;
                attributes.into_owned()
            };

            let mut fresh = self.new_aggregation();
            fresh.aggregate_at(value, observation_time);
            match batch.entry(key) {
                Entry::Occupied(mut entry) => {
                    let merged = entry.get().merge(fresh.as_ref());
                    entry.insert(merged);
                },
                Entry::Vacant(entry) => {
                    entry.insert(fresh);
                },
            }
        }

        let accumulate = self.aggregation_type == AggregationType::Histogram;
        for (attributes, aggregation) in batch {
            state.touched.insert(attributes.clone());
            match state.observed.entry(attributes) {
                Entry::Occupied(mut entry) if accumulate => {
                    let merged = entry.get().merge(aggregation.as_ref());
                    entry.insert(merged);
                },
                Entry::Occupied(mut entry) => {
                    entry.insert(aggregation);
                },
                Entry::Vacant(entry) => {
                    entry.insert(aggregation);
                },
            }
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
}

impl AsyncWritableMetricStorage for AsyncMetricStorage {
    fn record_long(&self, measurements: &Measurements<i64>, observation_time: SystemTime) {
        self.record(
            measurements
                .iter()
                .map(|(attributes, value)| (attributes, MetricValue::Long(*value))),
            observation_time,
        );
    }

    fn record_double(&self, measurements: &Measurements<f64>, observation_time: SystemTime) {
        self.record(
            measurements
                .iter()
                .map(|(attributes, value)| (attributes, MetricValue::Double(*value))),
            observation_time,
        );
    }
}

impl CollectableMetricStorage for AsyncMetricStorage {
    fn collect(&self, temporality: Temporality, collection_ts: SystemTime) -> MetricData {
        let mut state = self.state.lock();

        let (start_ts, points) = match temporality {
            Temporality::Cumulative => {
                let points = state
                    .observed
                    .iter()
                    .map(|(attributes, aggregation)| PointDataAttributes {
                        attributes: attributes.clone(),
                        point: aggregation.to_point(),
                    })
                    .collect();
                state.touched.clear();
                (state.start_ts, points)
            },
            Temporality::Delta => {
                // Only this cycle's reports are exported; series nobody
                // reported since the last collection are forgotten.
                let touched = std::mem::take(&mut state.touched);
                state.observed.retain(|attributes, _| touched.contains(attributes));

                let mut points = Vec::with_capacity(state.observed.len());
                let mut reported = AggregationMap::default();
                for (attributes, aggregation) in &state.observed {
                    let point = match state.last_reported.get(attributes) {
                        Some(previous) => previous.diff(aggregation.as_ref()).to_point(),
                        None => aggregation.to_point(),
                    };
                    points.push(PointDataAttributes {
                        attributes: attributes.clone(),
                        point,
                    });
                    reported.insert(
                        attributes.clone(),
                        DefaultAggregation::clone_aggregation(
                            self.aggregation_type,
                            &self.descriptor,
                            aggregation.as_ref(),
                        ),
                    );
                }
                state.last_reported = reported;
                (state.last_collection_ts, points)
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
