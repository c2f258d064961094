//! Metric aggregation, storage and observable collection.
//!
//! Data flows one way:
//! - synchronous instruments record into a [`SyncMultiMetricStorage`]
//! - observer callbacks registered in the [`ObservableRegistry`] report
//!   through an [`ObserverResult`] into an [`AsyncMultiMetricStorage`]
//! - each child storage keys an [`Aggregation`] per attribute set
//! - readers collect [`MetricData`] through [`CollectableMetricStorage`]

pub mod aggregation;
pub mod data;
pub mod observer;
pub mod pipeline;
pub mod registry;
pub mod storage;
pub mod types;

pub use aggregation::{
    Aggregation, AggregationConfig, DefaultAggregation, DropAggregation, HistogramAggregation,
    HistogramAggregationConfig, LastValueAggregation, SumAggregation,
};
pub use data::{
    DropPointData, HistogramPointData, LastValuePointData, MetricData, PointData,
    PointDataAttributes, SumPointData,
};
pub use observer::ObserverResult;
pub use pipeline::{Collection, MetricPipeline};
pub use registry::{
    callback, ObservableCallback, ObservableCallbackRecord, ObservableInstrument,
    ObservableRegistry,
};
pub use storage::{
    AsyncMetricStorage, AsyncMultiMetricStorage, AsyncWritableMetricStorage,
    CollectableMetricStorage, Measurements, SyncMetricStorage, SyncMultiMetricStorage,
    SyncWritableMetricStorage, OVERFLOW_ATTRIBUTES,
};
pub use types::{MetricValue, Number};
