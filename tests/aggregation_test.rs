//! Aggregation factory and aggregation semantics through the public API.

mod common;

use common::{at, TestInstrumentBuilder};
use pretty_assertions::assert_eq;
use urpo_metrics::core::{AggregationType, InstrumentType};
use urpo_metrics::metrics::{
    AggregationConfig, DefaultAggregation, HistogramAggregationConfig, MetricValue, PointData,
};

#[test]
fn test_counter_sum_scenario() {
    let counter = TestInstrumentBuilder::new("jobs").build();
    let mut sum = DefaultAggregation::create_aggregation(&counter, None);

    for value in [3, 5, -2] {
        sum.aggregate(MetricValue::Long(value));
    }

    let point = sum.to_point();
    assert_eq!(point.as_sum().map(|p| p.value), Some(MetricValue::Long(6)));
    assert_eq!(point.as_sum().map(|p| p.is_monotonic), Some(true));
}

#[test]
fn test_histogram_buckets_are_upper_inclusive() {
    let histogram = TestInstrumentBuilder::new("latency")
        .kind(InstrumentType::Histogram)
        .double()
        .unit("ms")
        .build();
    let config = AggregationConfig::from(HistogramAggregationConfig::with_boundaries(vec![10.0, 20.0]).unwrap());
    let mut aggregation = DefaultAggregation::create_aggregation(&histogram, Some(&config));

    for value in [10.0, 10.5, 20.0, 25.0] {
        aggregation.aggregate(MetricValue::Double(value));
    }

    match aggregation.to_point() {
        PointData::Histogram(point) => {
            assert_eq!(point.counts, vec![1, 2, 1]);
            assert_eq!(point.count, 4);
            assert_eq!(point.min, MetricValue::Double(10.0));
            assert_eq!(point.max, MetricValue::Double(25.0));
        },
        other => panic!("expected histogram, got {other:?}"),
    }
}

#[test]
fn test_merge_then_diff_recovers_delta() {
    let counter = TestInstrumentBuilder::new("bytes").double().build();
    let mut earlier = DefaultAggregation::create_aggregation(&counter, None);
    earlier.aggregate(MetricValue::Double(10.0));
    let mut delta = DefaultAggregation::create_aggregation(&counter, None);
    delta.aggregate(MetricValue::Double(2.5));

    let later = earlier.merge(delta.as_ref());
    let recovered = earlier.diff(later.as_ref());

    assert_eq!(recovered.to_point(), delta.to_point());
}

#[test]
fn test_override_forces_family() {
    let counter = TestInstrumentBuilder::new("queue").build();

    let forced =
        DefaultAggregation::create_aggregation_of_type(AggregationType::LastValue, &counter, None);
    assert_eq!(forced.aggregation_type(), AggregationType::LastValue);

    let dropped = DefaultAggregation::create_aggregation_of_type(AggregationType::Drop, &counter, None);
    assert_eq!(dropped.aggregation_type(), AggregationType::Drop);
}

#[test]
fn test_clone_keeps_accumulated_state() {
    let gauge = TestInstrumentBuilder::new("temperature")
        .kind(InstrumentType::ObservableGauge)
        .double()
        .build();
    let mut original = DefaultAggregation::create_aggregation(&gauge, None);
    original.aggregate_at(MetricValue::Double(21.5), at(100));

    let copy = DefaultAggregation::clone_aggregation(AggregationType::LastValue, &gauge, original.as_ref());
    original.aggregate_at(MetricValue::Double(30.0), at(200));

    let point = copy.to_point();
    let last = point.as_last_value().unwrap();
    assert_eq!(last.value, MetricValue::Double(21.5));
    assert_eq!(last.sample_ts, at(100));
    assert!(last.is_valid);
}

#[test]
fn test_wrong_numeric_kind_is_ignored() {
    let counter = TestInstrumentBuilder::new("jobs").build();
    let mut sum = DefaultAggregation::create_aggregation(&counter, None);

    sum.aggregate(MetricValue::Long(4));
    sum.aggregate(MetricValue::Double(100.0));

    assert_eq!(sum.to_point().as_sum().map(|p| p.value), Some(MetricValue::Long(4)));
}

#[test]
#[should_panic(expected = "cannot merge")]
fn test_merging_families_panics() {
    let counter = TestInstrumentBuilder::new("jobs").build();
    let sum = DefaultAggregation::create_aggregation(&counter, None);
    let last = DefaultAggregation::create_aggregation_of_type(AggregationType::LastValue, &counter, None);

    let _ = sum.merge(last.as_ref());
}
