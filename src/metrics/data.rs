//! Immutable point snapshots read out of aggregations.

use crate::core::{AggregationType, InstrumentDescriptor, MetricAttributes, Temporality};
use crate::metrics::types::MetricValue;
use std::time::SystemTime;

/// Snapshot of a sum aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct SumPointData {
    /// Running total
    pub value: MetricValue,
    /// Whether the sum only ever increases
    pub is_monotonic: bool,
}

/// Snapshot of a last-value aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct LastValuePointData {
    /// Most recent value
    pub value: MetricValue,
    /// False until the first value is recorded
    pub is_valid: bool,
    /// When the value was observed
    pub sample_ts: SystemTime,
}

/// Snapshot of an explicit-bucket histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramPointData {
    /// Upper-inclusive bucket boundaries
    pub boundaries: Vec<f64>,
    /// Sum of recorded values
    pub sum: MetricValue,
    /// Smallest recorded value, meaningful when `record_min_max` is set
    pub min: MetricValue,
    /// Largest recorded value, meaningful when `record_min_max` is set
    pub max: MetricValue,
    /// Per-bucket counts, `boundaries.len() + 1` entries
    pub counts: Vec<u64>,
    /// Total number of recorded values
    pub count: u64,
    /// Whether min and max are tracked
    pub record_min_max: bool,
}

/// Snapshot of a drop aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropPointData;

/// Point exported for one attribute set.
#[derive(Debug, Clone, PartialEq)]
pub enum PointData {
    /// Sum point
    Sum(SumPointData),
    /// Last-value point
    LastValue(LastValuePointData),
    /// Histogram point
    Histogram(HistogramPointData),
    /// Dropped stream
    Drop(DropPointData),
}

impl PointData {
    /// Aggregation family that produced this point.
    pub fn aggregation_type(&self) -> AggregationType {
        match self {
            Self::Sum(_) => AggregationType::Sum,
            Self::LastValue(_) => AggregationType::LastValue,
            Self::Histogram(_) => AggregationType::Histogram,
            Self::Drop(_) => AggregationType::Drop,
        }
    }

    /// Sum payload, if this is a sum point.
    pub fn as_sum(&self) -> Option<&SumPointData> {
        match self {
            Self::Sum(point) => Some(point),
            _ => None,
        }
    }

    /// Last-value payload, if this is a last-value point.
    pub fn as_last_value(&self) -> Option<&LastValuePointData> {
        match self {
            Self::LastValue(point) => Some(point),
            _ => None,
        }
    }

    /// Histogram payload, if this is a histogram point.
    pub fn as_histogram(&self) -> Option<&HistogramPointData> {
        match self {
            Self::Histogram(point) => Some(point),
            _ => None,
        }
    }
}

/// A point paired with the attribute set it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct PointDataAttributes {
    /// Series identity
    pub attributes: MetricAttributes,
    /// Exported value
    pub point: PointData,
}

/// Everything one storage reported in one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricData {
    /// Instrument the points belong to
    pub descriptor: InstrumentDescriptor,
    /// Window the points cover
    pub temporality: Temporality,
    /// Start of the window
    pub start_ts: SystemTime,
    /// Collection time
    pub end_ts: SystemTime,
    /// One point per attribute set
    pub points: Vec<PointDataAttributes>,
}

impl MetricData {
    /// Point reported for `attributes`.
    pub fn point(&self, attributes: &MetricAttributes) -> Option<&PointData> {
        self.points
            .iter()
            .find(|p| &p.attributes == attributes)
            .map(|p| &p.point)
    }
}
