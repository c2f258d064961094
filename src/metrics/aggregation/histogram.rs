//! Explicit-bucket histogram aggregation.

use super::config::HistogramAggregationConfig;
use super::{expect_same, ignore_mismatched, Aggregation};
use crate::core::AggregationType;
use crate::metrics::data::{HistogramPointData, PointData};
use crate::metrics::types::{MetricValue, Number};
use std::any::Any;

/// Bucket counts plus sum, count and optional min/max.
///
/// Bucket `i` holds values in `(boundaries[i-1], boundaries[i]]`; the last
/// bucket holds everything above the final boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramAggregation<T: Number> {
    boundaries: Vec<f64>,
    counts: Vec<u64>,
    sum: T,
    min: T,
    max: T,
    count: u64,
    record_min_max: bool,
}

impl<T: Number> Default for HistogramAggregation<T> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<T: Number> HistogramAggregation<T> {
    /// Empty histogram using `config`, or the default boundaries.
    pub fn new(config: Option<&HistogramAggregationConfig>) -> Self {
        let default_config;
        let config = match config {
            Some(config) => config,
            None => {
                default_config = HistogramAggregationConfig::default();
                &default_config
            },
        };

        Self {
            counts: vec![0; config.boundaries.len() + 1],
            boundaries: config.boundaries.clone(),
            sum: T::default(),
            min: T::MAX,
            max: T::MIN,
            count: 0,
            record_min_max: config.record_min_max,
        }
    }

    /// Histogram seeded from an exported point.
    ///
    /// # Panics
    ///
    /// If the point carries the other numeric kind or its counts do not
    /// match its boundaries.
    pub fn from_point(point: &HistogramPointData) -> Self {
        assert_eq!(
            point.counts.len(),
            point.boundaries.len() + 1,
            "histogram point has {} counts for {} boundaries",
            point.counts.len(),
            point.boundaries.len()
        );
        let unwrap = |value: MetricValue| {
            T::from_value(value).unwrap_or_else(|| {
                panic!(
                    "cannot seed a {:?} histogram from point value {:?}",
                    T::VALUE_TYPE,
                    value
                )
            })
        };

        Self {
            boundaries: point.boundaries.clone(),
            counts: point.counts.clone(),
            sum: unwrap(point.sum),
            min: unwrap(point.min),
            max: unwrap(point.max),
            count: point.count,
            record_min_max: point.record_min_max,
        }
    }

    #[inline]
    fn bucket_index(&self, value: f64) -> usize {
        self.boundaries.partition_point(|boundary| *boundary < value)
    }

    fn check_layout(&self, other: &Self, operation: &str) {
        assert!(
            self.boundaries == other.boundaries,
            "cannot {operation} histograms with different boundaries: {:?} vs {:?}",
            self.boundaries,
            other.boundaries
        );
    }
}

impl<T: Number> Aggregation for HistogramAggregation<T> {
    fn aggregate(&mut self, value: MetricValue) {
        let Some(v) = T::from_value(value) else {
            ignore_mismatched(value, AggregationType::Histogram);
            return;
        };

        let idx = self.bucket_index(v.to_f64());
        self.counts[idx] += 1;
        self.count += 1;
        self.sum = self.sum.plus(v);
        if self.record_min_max {
            if v < self.min {
                self.min = v;
            }
            if v > self.max {
                self.max = v;
            }
        }
    }

    fn merge(&self, delta: &dyn Aggregation) -> Box<dyn Aggregation> {
        let delta = expect_same(delta, "merge", self);
        self.check_layout(delta, "merge");

        let record_min_max = self.record_min_max && delta.record_min_max;
        let (min, max) = if record_min_max {
            (
                if delta.min < self.min { delta.min } else { self.min },
                if delta.max > self.max { delta.max } else { self.max },
            )
        } else {
            (T::MAX, T::MIN)
        };

        Box::new(Self {
            boundaries: self.boundaries.clone(),
            counts: self
                .counts
                .iter()
                .zip(&delta.counts)
                .map(|(a, b)| a.saturating_add(*b))
                .collect(),
            sum: self.sum.plus(delta.sum),
            min,
            max,
            count: self.count.saturating_add(delta.count),
            record_min_max,
        })
    }

    fn diff(&self, next: &dyn Aggregation) -> Box<dyn Aggregation> {
        let next = expect_same(next, "diff", self);
        self.check_layout(next, "diff");

        // min/max cannot be recovered for a window, so the delta drops them
        Box::new(Self {
            boundaries: self.boundaries.clone(),
            counts: next
                .counts
                .iter()
                .zip(&self.counts)
                .map(|(later, earlier)| later.saturating_sub(*earlier))
                .collect(),
            sum: next.sum.minus(self.sum),
            min: next.min,
            max: next.max,
            count: next.count.saturating_sub(self.count),
            record_min_max: false,
        })
    }

    fn to_point(&self) -> PointData {
        PointData::Histogram(HistogramPointData {
            boundaries: self.boundaries.clone(),
            sum: self.sum.into_value(),
            min: self.min.into_value(),
            max: self.max.into_value(),
            counts: self.counts.clone(),
            count: self.count,
            record_min_max: self.record_min_max,
        })
    }

    fn aggregation_type(&self) -> AggregationType {
        AggregationType::Histogram
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
