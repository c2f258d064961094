//! Reader/view wiring from a [`Config`].
//!
//! Every instrument gets one child storage per (reader, matching view). The
//! instrument writes through a multi storage; each reader collects only the
//! children built for it.

use crate::core::config::ViewConfig;
use crate::core::{
    AggregationType, CallbackFailure, Config, InstrumentDescriptor, MetricsError, Result,
};
use crate::metrics::aggregation::{AggregationConfig, DefaultAggregation, HistogramAggregationConfig};
use crate::metrics::data::MetricData;
use crate::metrics::registry::{ObservableInstrument, ObservableRegistry};
use crate::metrics::storage::{
    AsyncMetricStorage, AsyncMultiMetricStorage, AsyncWritableMetricStorage, AttributesProcessor,
    CollectableMetricStorage, DefaultAttributesProcessor, FilteringAttributesProcessor,
    SyncMetricStorage, SyncMultiMetricStorage, SyncWritableMetricStorage,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

/// Everything one reader collected in one cycle.
#[derive(Debug, Clone)]
pub struct Collection {
    /// Reader that collected
    pub reader: String,
    /// One entry per (instrument, view) stream
    pub metrics: Vec<MetricData>,
    /// Observer callbacks that failed this cycle; their instruments kept
    /// their previous state
    pub callback_failures: Vec<CallbackFailure>,
}

impl Collection {
    /// First stream for the named instrument.
    pub fn metric(&self, instrument_name: &str) -> Option<&MetricData> {
        self.metrics
            .iter()
            .find(|data| data.descriptor.name == instrument_name)
    }

    /// Whether every observer callback succeeded.
    pub fn is_complete(&self) -> bool {
        self.callback_failures.is_empty()
    }
}

/// Per-stream settings derived from a view.
struct StreamSettings {
    aggregation_type: AggregationType,
    aggregation_config: Option<AggregationConfig>,
    processor: Arc<dyn AttributesProcessor>,
}

/// Builds instrument storages and drives collection for each reader.
pub struct MetricPipeline {
    config: Config,
    registry: Arc<ObservableRegistry>,
    /// Collectable storages per reader name
    storages: RwLock<HashMap<String, Vec<Arc<dyn CollectableMetricStorage>>>>,
}

impl MetricPipeline {
    /// Validate `config` and create an empty pipeline.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            "Metric pipeline with {} reader(s) and {} view(s)",
            config.readers.len(),
            config.views.len()
        );

        let storages = config
            .readers
            .iter()
            .map(|reader| (reader.name.clone(), Vec::new()))
            .collect();

        Ok(Self {
            config,
            registry: Arc::new(ObservableRegistry::new()),
            storages: RwLock::new(storages),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registry every observable instrument of this pipeline uses.
    pub fn registry(&self) -> &Arc<ObservableRegistry> {
        &self.registry
    }

    /// Storage for a synchronous instrument.
    ///
    /// Views that resolve to `Drop` get no child, so a fully dropped
    /// instrument records into an empty fan-out.
    pub fn create_sync_storage(&self, descriptor: &InstrumentDescriptor) -> Result<Arc<SyncMultiMetricStorage>> {
        if descriptor.instrument_type.is_asynchronous() {
            return Err(MetricsError::config(format!(
                "{descriptor} is asynchronous; use create_observable_instrument"
            )));
        }

        let mut multi = SyncMultiMetricStorage::new();
        let mut storages = self.storages.write();
        for reader in &self.config.readers {
            for settings in self.streams(descriptor) {
                let storage = Arc::new(self.sync_storage(descriptor, settings));
                multi.add_storage(Arc::clone(&storage) as Arc<dyn SyncWritableMetricStorage>);
                storages
                    .entry(reader.name.clone())
                    .or_default()
                    .push(storage);
            }
        }

        tracing::debug!("Instrument {} writes to {} storage(s)", descriptor.name, multi.len());
        Ok(Arc::new(multi))
    }

    /// Observable instrument registered with this pipeline's registry.
    pub fn create_observable_instrument(
        &self,
        descriptor: &InstrumentDescriptor,
    ) -> Result<Arc<ObservableInstrument>> {
        if descriptor.instrument_type.is_synchronous() {
            return Err(MetricsError::config(format!(
                "{descriptor} is synchronous; use create_sync_storage"
            )));
        }

        let mut multi = AsyncMultiMetricStorage::new();
        let mut storages = self.storages.write();
        for reader in &self.config.readers {
            for settings in self.streams(descriptor) {
                let storage = Arc::new(self.async_storage(descriptor, settings));
                multi.add_storage(Arc::clone(&storage) as Arc<dyn AsyncWritableMetricStorage>);
                storages
                    .entry(reader.name.clone())
                    .or_default()
                    .push(storage);
            }
        }

        tracing::debug!("Instrument {} writes to {} storage(s)", descriptor.name, multi.len());
        Ok(ObservableInstrument::new(
            descriptor.clone(),
            Arc::new(multi),
            Arc::clone(&self.registry),
        ))
    }

    /// Run every observer callback, then collect `reader_name`'s storages.
    ///
    /// Callback failures do not fail the collection; they are listed in
    /// [`Collection::callback_failures`].
    pub fn collect(&self, reader_name: &str, collection_ts: SystemTime) -> Result<Collection> {
        let reader = self
            .config
            .reader(reader_name)
            .ok_or_else(|| MetricsError::UnknownReader(reader_name.to_string()))?;
        let started = Instant::now();

        let callback_failures = match self.registry.observe(collection_ts) {
            Ok(()) => Vec::new(),
            Err(MetricsError::CallbackFailed { failures }) => failures,
            Err(e) => return Err(e),
        };

        let storages = self
            .storages
            .read()
            .get(reader_name)
            .cloned()
            .unwrap_or_default();
        let metrics: Vec<MetricData> = storages
            .iter()
            .map(|storage| storage.collect(reader.temporality, collection_ts))
            .collect();

        let elapsed = started.elapsed();
        if elapsed > self.config.collection.slow_threshold {
            tracing::warn!(
                "Collection for reader {} took {:?} (threshold {:?})",
                reader_name,
                elapsed,
                self.config.collection.slow_threshold
            );
        }
        tracing::debug!(
            "Reader {} collected {} stream(s), {} callback failure(s)",
            reader_name,
            metrics.len(),
            callback_failures.len()
        );

        Ok(Collection {
            reader: reader_name.to_string(),
            metrics,
            callback_failures,
        })
    }

    /// Settings for every non-dropped stream `descriptor` produces.
    fn streams(&self, descriptor: &InstrumentDescriptor) -> Vec<StreamSettings> {
        let default_view = ViewConfig::new("*", AggregationType::Default);
        let mut views: Vec<&ViewConfig> = self
            .config
            .views
            .iter()
            .filter(|view| view.matches(&descriptor.name))
            .collect();
        if views.is_empty() {
            views.push(&default_view);
        }

        views
            .into_iter()
            .filter_map(|view| {
                let aggregation_type = DefaultAggregation::resolve(view.aggregation, descriptor);
                if aggregation_type == AggregationType::Drop {
                    tracing::debug!("View {} drops {}", view.instrument_name, descriptor.name);
                    return None;
                }
                Some(StreamSettings {
                    aggregation_type,
                    aggregation_config: self.aggregation_config(view, aggregation_type),
                    processor: match &view.attribute_keys {
                        Some(keys) => Arc::new(FilteringAttributesProcessor::new(keys.iter().cloned())),
                        None => Arc::new(DefaultAttributesProcessor),
                    },
                })
            })
            .collect()
    }

    fn aggregation_config(&self, view: &ViewConfig, aggregation_type: AggregationType) -> Option<AggregationConfig> {
        if aggregation_type != AggregationType::Histogram {
            return None;
        }
        let mut histogram = HistogramAggregationConfig::from(&self.config.aggregation);
        if let Some(boundaries) = &view.histogram_boundaries {
            histogram.boundaries = boundaries.clone();
        }
        Some(histogram.into())
    }

    fn sync_storage(&self, descriptor: &InstrumentDescriptor, settings: StreamSettings) -> SyncMetricStorage {
        let storage = SyncMetricStorage::new(descriptor.clone(), settings.aggregation_type)
            .with_attributes_processor(settings.processor)
            .with_cardinality_limit(self.config.storage.cardinality_limit);
        match settings.aggregation_config {
            Some(config) => storage.with_aggregation_config(config),
            None => storage,
        }
    }

    fn async_storage(&self, descriptor: &InstrumentDescriptor, settings: StreamSettings) -> AsyncMetricStorage {
        let storage = AsyncMetricStorage::new(descriptor.clone(), settings.aggregation_type)
            .with_attributes_processor(settings.processor)
            .with_cardinality_limit(self.config.storage.cardinality_limit);
        match settings.aggregation_config {
            Some(config) => storage.with_aggregation_config(config),
            None => storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConfigBuilder, InstrumentType, InstrumentValueType, MetricAttributes, Temporality};
    use crate::metrics::registry::callback;
    use crate::metrics::types::MetricValue;
    use opentelemetry::Context;

    fn counter(name: &str) -> InstrumentDescriptor {
        InstrumentDescriptor::new(name, InstrumentType::Counter, InstrumentValueType::Long)
    }

    #[test]
    fn test_each_reader_gets_its_own_storage() {
        let config = ConfigBuilder::new()
            .reader("cumulative", Temporality::Cumulative)
            .add_reader("delta", Temporality::Delta)
            .build()
            .unwrap();
        let pipeline = MetricPipeline::new(config).unwrap();
        let storage = pipeline.create_sync_storage(&counter("requests")).unwrap();
        assert_eq!(storage.len(), 2);

        let cx = Context::new();
        storage.record_long(2, &cx);
        let now = SystemTime::now();
        pipeline.collect("delta", now).unwrap();
        storage.record_long(3, &cx);

        let cumulative = pipeline.collect("cumulative", now).unwrap();
        let delta = pipeline.collect("delta", now).unwrap();
        let value = |c: &Collection| {
            c.metric("requests").unwrap().points[0].point.as_sum().unwrap().value
        };
        assert_eq!(value(&cumulative), MetricValue::Long(5));
        assert_eq!(value(&delta), MetricValue::Long(3));
    }

    #[test]
    fn test_unknown_reader_is_an_error() {
        let pipeline = MetricPipeline::new(Config::default()).unwrap();
        let err = pipeline.collect("missing", SystemTime::now()).unwrap_err();
        assert!(matches!(err, MetricsError::UnknownReader(name) if name == "missing"));
    }

    #[test]
    fn test_drop_view_leaves_empty_fan_out() {
        let config = ConfigBuilder::new()
            .view(ViewConfig::new("noisy", AggregationType::Drop))
            .build()
            .unwrap();
        let pipeline = MetricPipeline::new(config).unwrap();

        let storage = pipeline.create_sync_storage(&counter("noisy")).unwrap();
        storage.record_long(1, &Context::new());

        assert!(storage.is_empty());
        assert!(pipeline.collect("default", SystemTime::now()).unwrap().metrics.is_empty());
    }

    #[test]
    fn test_view_filters_attributes() {
        let mut view = ViewConfig::new("requests", AggregationType::Default);
        view.attribute_keys = Some(vec!["route".to_string()]);
        let pipeline = MetricPipeline::new(ConfigBuilder::new().view(view).build().unwrap()).unwrap();
        let storage = pipeline.create_sync_storage(&counter("requests")).unwrap();

        let cx = Context::new();
        storage.record_long_with_attributes(1, &MetricAttributes::from([("route", "/"), ("peer", "a")]), &cx);
        storage.record_long_with_attributes(1, &MetricAttributes::from([("route", "/"), ("peer", "b")]), &cx);

        let collection = pipeline.collect("default", SystemTime::now()).unwrap();
        let data = collection.metric("requests").unwrap();
        assert_eq!(data.points.len(), 1);
        assert_eq!(data.points[0].attributes, MetricAttributes::from([("route", "/")]));
    }

    #[test]
    fn test_wrong_instrument_kind_is_rejected() {
        let pipeline = MetricPipeline::new(Config::default()).unwrap();
        let gauge = InstrumentDescriptor::new("temp", InstrumentType::ObservableGauge, InstrumentValueType::Double);

        assert!(pipeline.create_sync_storage(&gauge).is_err());
        assert!(pipeline.create_observable_instrument(&counter("requests")).is_err());
    }

    #[test]
    fn test_callback_failures_are_reported_not_fatal() {
        let pipeline = MetricPipeline::new(Config::default()).unwrap();
        let gauge = InstrumentDescriptor::new("temp", InstrumentType::ObservableGauge, InstrumentValueType::Double);
        let instrument = pipeline.create_observable_instrument(&gauge).unwrap();
        instrument.add_callback(callback(|_| anyhow::bail!("sensor offline")));

        let collection = pipeline.collect("default", SystemTime::now()).unwrap();
        assert!(!collection.is_complete());
        assert_eq!(collection.callback_failures[0].instrument, "temp");
        assert!(collection.metric("temp").unwrap().points.is_empty());
    }
}
