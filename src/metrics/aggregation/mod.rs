//! Stateful accumulators turning recorded values into exportable points.
//!
//! Every concrete aggregation sits behind [`Aggregation`]. The family axis
//! (sum, last value, histogram, drop) is the concrete type; the numeric axis
//! (long, double) is a generic parameter, so a `SumAggregation<i64>` and a
//! `SumAggregation<f64>` are distinct types that refuse to merge.

pub mod config;
pub mod default;
pub mod drop;
pub mod histogram;
pub mod last_value;
pub mod sum;

pub use config::{AggregationConfig, HistogramAggregationConfig};
pub use default::DefaultAggregation;
pub use drop::DropAggregation;
pub use histogram::HistogramAggregation;
pub use last_value::LastValueAggregation;
pub use sum::SumAggregation;

use crate::core::AggregationType;
use crate::metrics::data::PointData;
use crate::metrics::types::MetricValue;
use std::any::Any;
use std::fmt;
use std::time::SystemTime;

/// Mutable accumulator for one attribute set.
///
/// `aggregate` never fails: a value of the wrong numeric kind is ignored.
/// `merge` and `diff` panic when `other` is a different concrete type,
/// since silently coercing would corrupt exported data.
pub trait Aggregation: fmt::Debug + Send + Sync {
    /// Fold one measurement in.
    fn aggregate(&mut self, value: MetricValue);

    /// Fold one measurement observed at `observed_at` in.
    ///
    /// Only time-aware aggregations care about the timestamp.
    fn aggregate_at(&mut self, value: MetricValue, _observed_at: SystemTime) {
        self.aggregate(value);
    }

    /// Combine with `delta`, covering the same attribute set.
    fn merge(&self, delta: &dyn Aggregation) -> Box<dyn Aggregation>;

    /// Change from `self` (earlier cumulative) to `next` (later cumulative).
    fn diff(&self, next: &dyn Aggregation) -> Box<dyn Aggregation>;

    /// Immutable snapshot of the current state.
    fn to_point(&self) -> PointData;

    /// Family of this aggregation.
    fn aggregation_type(&self) -> AggregationType;

    /// Used to downcast the other operand of `merge`/`diff`.
    fn as_any(&self) -> &dyn Any;
}

/// Downcast `other` to the concrete type of the receiver or fail fast.
pub(crate) fn expect_same<'a, T: Aggregation + 'static>(
    other: &'a dyn Aggregation,
    operation: &str,
    receiver: &T,
) -> &'a T {
    match other.as_any().downcast_ref::<T>() {
        Some(same) => same,
        None => panic!(
            "cannot {operation} {receiver:?} with incompatible aggregation {other:?}"
        ),
    }
}

/// Trace-log a value whose numeric kind does not match the aggregation.
#[cold]
pub(crate) fn ignore_mismatched(value: MetricValue, aggregation: AggregationType) {
    tracing::trace!(
        "Ignoring {:?} value {} recorded into a {:?} aggregation of the other numeric kind",
        value.value_type(),
        value,
        aggregation
    );
}
