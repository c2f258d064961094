//! Last-value (gauge) aggregation.

use super::{expect_same, ignore_mismatched, Aggregation};
use crate::core::AggregationType;
use crate::metrics::data::{LastValuePointData, PointData};
use crate::metrics::types::{MetricValue, Number};
use std::any::Any;
use std::time::SystemTime;

/// Keeps the most recently written value.
///
/// Writes are applied in the order they reach the aggregation; timestamps are
/// only compared when two aggregations are merged or diffed.
#[derive(Debug, Clone, PartialEq)]
pub struct LastValueAggregation<T: Number> {
    value: T,
    is_valid: bool,
    sample_ts: SystemTime,
}

impl<T: Number> Default for LastValueAggregation<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Number> LastValueAggregation<T> {
    /// Aggregation with no value yet.
    pub fn new() -> Self {
        Self {
            value: T::default(),
            is_valid: false,
            sample_ts: SystemTime::UNIX_EPOCH,
        }
    }

    /// Aggregation seeded from an exported point.
    ///
    /// # Panics
    ///
    /// If the point carries the other numeric kind.
    pub fn from_point(point: &LastValuePointData) -> Self {
        let value = T::from_value(point.value).unwrap_or_else(|| {
            panic!(
                "cannot seed a {:?} last value from point value {:?}",
                T::VALUE_TYPE,
                point.value
            )
        });
        Self {
            value,
            is_valid: point.is_valid,
            sample_ts: point.sample_ts,
        }
    }

    /// Later of `self` and `other`; ties go to `other`.
    fn newer(&self, other: &Self) -> Self {
        if other.is_valid && (!self.is_valid || other.sample_ts >= self.sample_ts) {
            other.clone()
        } else {
            self.clone()
        }
    }
}

impl<T: Number> Aggregation for LastValueAggregation<T> {
    fn aggregate(&mut self, value: MetricValue) {
        self.aggregate_at(value, SystemTime::now());
    }

    fn aggregate_at(&mut self, value: MetricValue, observed_at: SystemTime) {
        match T::from_value(value) {
            Some(v) => {
                self.value = v;
                self.is_valid = true;
                self.sample_ts = observed_at;
            },
            None => ignore_mismatched(value, AggregationType::LastValue),
        }
    }

    fn merge(&self, delta: &dyn Aggregation) -> Box<dyn Aggregation> {
        let delta = expect_same(delta, "merge", self);
        Box::new(self.newer(delta))
    }

    fn diff(&self, next: &dyn Aggregation) -> Box<dyn Aggregation> {
        let next = expect_same(next, "diff", self);
        Box::new(self.newer(next))
    }

    fn to_point(&self) -> PointData {
        PointData::LastValue(LastValuePointData {
            value: self.value.into_value(),
            is_valid: self.is_valid,
            sample_ts: self.sample_ts,
        })
    }

    fn aggregation_type(&self) -> AggregationType {
        AggregationType::LastValue
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
