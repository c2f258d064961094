//! Urpo Metrics - in-process OpenTelemetry metrics core.
//!
//! Turns synchronous measurements and periodic observer callbacks into
//! aggregated, exportable points. Instruments and exporters live outside
//! this crate; it owns what sits between them.
//!
//! # Features
//!
//! - **Aggregations**: sum, last value, explicit-bucket histogram and drop,
//!   for both `i64` and `f64` streams
//! - **Attribute-keyed storage**: sharded, concurrent recording with a
//!   cardinality limit and overflow series
//! - **Observable registry**: callbacks run once per collection with
//!   per-callback failure isolation
//! - **Readers and views**: one storage per reader and view, cumulative or
//!   delta temporality, attribute filtering
//!
//! # Architecture
//!
//! - `core`: instrument model, attributes, errors, configuration, logging
//! - `metrics`: aggregations, storages, observer registry, pipeline
//!
//! # Example
//!
//! ```
//! use std::time::SystemTime;
//! use urpo_metrics::core::{Config, InstrumentDescriptor, InstrumentType, InstrumentValueType, MetricAttributes};
//! use urpo_metrics::metrics::{MetricPipeline, SyncWritableMetricStorage};
//!
//! # fn main() -> urpo_metrics::Result<()> {
//! let pipeline = MetricPipeline::new(Config::default())?;
//! let requests = pipeline.create_sync_storage(&InstrumentDescriptor::new(
//!     "http.requests",
//!     InstrumentType::Counter,
//!     InstrumentValueType::Long,
//! ))?;
//!
//! let cx = opentelemetry::Context::new();
//! requests.record_long_with_attributes(1, &MetricAttributes::from([("route", "/")]), &cx);
//!
//! let collection = pipeline.collect("default", SystemTime::now())?;
//! assert_eq!(collection.metrics.len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod core;
pub mod metrics;

// Re-export core types for convenience
pub use crate::core::{Config, MetricsError, Result};
pub use crate::metrics::{MetricPipeline, ObservableRegistry};
