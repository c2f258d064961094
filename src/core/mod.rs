//! Shared domain types and ambient concerns for the metrics core.
//!
//! This module contains the instrument and attribute model plus the error,
//! configuration and logging plumbing used by every metrics component.

#![warn(missing_docs)]

pub mod attributes;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use attributes::{AttributeValue, MetricAttributes};
pub use config::{Config, ConfigBuilder, ReaderConfig, ViewConfig};
pub use error::{CallbackFailure, MetricsError, Result};
pub use types::{
    AggregationType, InstrumentDescriptor, InstrumentType, InstrumentValueType, Temporality,
};
