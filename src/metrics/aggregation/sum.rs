//! Arithmetic sum aggregation.

use super::{expect_same, ignore_mismatched, Aggregation};
use crate::core::AggregationType;
use crate::metrics::data::{PointData, SumPointData};
use crate::metrics::types::{MetricValue, Number};
use std::any::Any;

/// Running total of every recorded value.
#[derive(Debug, Clone, PartialEq)]
pub struct SumAggregation<T: Number> {
    value: T,
    is_monotonic: bool,
}

impl<T: Number> SumAggregation<T> {
    /// Empty sum.
    pub fn new(is_monotonic: bool) -> Self {
        Self {
            value: T::default(),
            is_monotonic,
        }
    }

    /// Sum seeded from an exported point.
    ///
    /// # Panics
    ///
    /// If the point carries the other numeric kind.
    pub fn from_point(point: &SumPointData) -> Self {
        let value = T::from_value(point.value).unwrap_or_else(|| {
            panic!(
                "cannot seed a {:?} sum from point value {:?}",
                T::VALUE_TYPE,
                point.value
            )
        });
        Self {
            value,
            is_monotonic: point.is_monotonic,
        }
    }
}

impl<T: Number> Aggregation for SumAggregation<T> {
    #[inline]
    fn aggregate(&mut self, value: MetricValue) {
        match T::from_value(value) {
            Some(v) => self.value = self.value.plus(v),
            None => ignore_mismatched(value, AggregationType::Sum),
        }
    }

    fn merge(&self, delta: &dyn Aggregation) -> Box<dyn Aggregation> {
        let delta = expect_same(delta, "merge", self);
        Box::new(Self {
            value: self.value.plus(delta.value),
            is_monotonic: self.is_monotonic,
        })
    }

    fn diff(&self, next: &dyn Aggregation) -> Box<dyn Aggregation> {
        let next = expect_same(next, "diff", self);
        Box::new(Self {
            value: next.value.minus(self.value),
            is_monotonic: self.is_monotonic,
        })
    }

    fn to_point(&self) -> PointData {
        PointData::Sum(SumPointData {
            value: self.value.into_value(),
            is_monotonic: self.is_monotonic,
        })
    }

    fn aggregation_type(&self) -> AggregationType {
        AggregationType::Sum
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
