//! Aggregation that discards everything.

use super::{expect_same, Aggregation};
use crate::core::AggregationType;
use crate::metrics::data::{DropPointData, PointData};
use crate::metrics::types::MetricValue;
use std::any::Any;

/// Accepts and discards every measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropAggregation;

impl Aggregation for DropAggregation {
    #[inline]
    fn aggregate(&mut self, _value: MetricValue) {}

    fn merge(&self, delta: &dyn Aggregation) -> Box<dyn Aggregation> {
        expect_same(delta, "merge", self);
        Box::new(DropAggregation)
    }

    fn diff(&self, next: &dyn Aggregation) -> Box<dyn Aggregation> {
        expect_same(next, "diff", self);
        Box::new(DropAggregation)
    }

    fn to_point(&self) -> PointData {
        PointData::Drop(DropPointData)
    }

    fn aggregation_type(&self) -> AggregationType {
        AggregationType::Drop
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
