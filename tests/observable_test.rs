//! Observable instruments driven through the pipeline's collection cycle.

mod common;

use common::{at, attrs, last_value, sum_value, TestInstrumentBuilder};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use urpo_metrics::core::{Config, ConfigBuilder, InstrumentType, MetricAttributes, Temporality};
use urpo_metrics::metrics::{
    callback, AsyncMultiMetricStorage, AsyncWritableMetricStorage, Measurements, MetricPipeline,
    MetricValue, SyncMultiMetricStorage, SyncWritableMetricStorage,
};

#[test]
fn test_second_gauge_callback_wins() {
    let pipeline = MetricPipeline::new(Config::default()).unwrap();
    let gauge = TestInstrumentBuilder::new("room.temperature")
        .kind(InstrumentType::ObservableGauge)
        .double()
        .build();
    let instrument = pipeline.create_observable_instrument(&gauge).unwrap();
    let x = attrs(&[("attr", "X")]);

    for value in [10.0, 20.0] {
        let x = x.clone();
        instrument.add_callback(callback(move |result| {
            result.observe_double(value, &x);
            Ok(())
        }));
    }

    let collection = pipeline.collect("default", at(60)).unwrap();
    let data = collection.metric("room.temperature").unwrap();
    assert_eq!(last_value(data, &x), Some(MetricValue::Double(20.0)));
}

#[test]
fn test_empty_fan_out_accepts_everything() {
    let sync = SyncMultiMetricStorage::new();
    let cx = opentelemetry::Context::new();
    sync.record_long(1, &cx);
    sync.record_long_with_attributes(2, &attrs(&[("k", "v")]), &cx);
    sync.record_double(3.0, &cx);
    sync.record_double_with_attributes(4.0, &attrs(&[("k", "v")]), &cx);

    let observed = AsyncMultiMetricStorage::new();
    let mut batch = Measurements::default();
    batch.insert(attrs(&[("k", "v")]), 5_i64);
    observed.record_long(&batch, at(1));

    assert!(sync.is_empty());
    assert!(observed.is_empty());
}

#[test]
fn test_removed_callback_stops_reporting() {
    let pipeline = MetricPipeline::new(Config::default()).unwrap();
    let counter = TestInstrumentBuilder::new("process.cpu.time")
        .kind(InstrumentType::ObservableCounter)
        .build();
    let instrument = pipeline.create_observable_instrument(&counter).unwrap();
    let ticks = Arc::new(AtomicI64::new(0));

    let observed = Arc::clone(&ticks);
    let cb = callback(move |result| {
        result.observe_long(observed.fetch_add(10, Ordering::SeqCst) + 10, &attrs(&[]));
        Ok(())
    });
    instrument.add_callback(Arc::clone(&cb));

    pipeline.collect("default", at(1)).unwrap();
    assert_eq!(instrument.remove_callback(&cb), 1);
    let collection = pipeline.collect("default", at(2)).unwrap();

    assert_eq!(ticks.load(Ordering::SeqCst), 10);
    let data = collection.metric("process.cpu.time").unwrap();
    assert_eq!(sum_value(data, &attrs(&[])), Some(MetricValue::Long(10)));
}

#[test]
fn test_failed_callback_keeps_other_instruments_collecting() {
    let pipeline = MetricPipeline::new(Config::default()).unwrap();
    let broken = pipeline
        .create_observable_instrument(
            &TestInstrumentBuilder::new("disk.free")
                .kind(InstrumentType::ObservableUpDownCounter)
                .build(),
        )
        .unwrap();
    let healthy = pipeline
        .create_observable_instrument(
            &TestInstrumentBuilder::new("threads")
                .kind(InstrumentType::ObservableUpDownCounter)
                .build(),
        )
        .unwrap();

    broken.add_callback(callback(|result| {
        result.observe_long(1, &attrs(&[("disk", "sda")]));
        anyhow::bail!("statvfs failed")
    }));
    healthy.add_callback(callback(|result| {
        result.observe_long(12, &attrs(&[]));
        Ok(())
    }));

    let collection = pipeline.collect("default", at(5)).unwrap();

    assert_eq!(collection.callback_failures.len(), 1);
    assert_eq!(collection.callback_failures[0].instrument, "disk.free");
    assert!(collection.metric("disk.free").unwrap().points.is_empty());
    assert_eq!(
        sum_value(collection.metric("threads").unwrap(), &attrs(&[])),
        Some(MetricValue::Long(12))
    );
}

#[test]
fn test_delta_reader_reports_observed_change() {
    let config = ConfigBuilder::new()
        .reader("otlp", Temporality::Delta)
        .build()
        .unwrap();
    let pipeline = MetricPipeline::new(config).unwrap();
    let instrument = pipeline
        .create_observable_instrument(
            &TestInstrumentBuilder::new("net.bytes")
                .kind(InstrumentType::ObservableCounter)
                .build(),
        )
        .unwrap();
    let total = Arc::new(AtomicI64::new(0));

    let observed = Arc::clone(&total);
    instrument.add_callback(callback(move |result| {
        result.observe_long(observed.load(Ordering::SeqCst), &attrs(&[("nic", "eth0")]));
        Ok(())
    }));

    total.store(100, Ordering::SeqCst);
    let first = pipeline.collect("otlp", at(10)).unwrap();
    total.store(175, Ordering::SeqCst);
    let second = pipeline.collect("otlp", at(20)).unwrap();

    let eth0 = attrs(&[("nic", "eth0")]);
    assert_eq!(sum_value(first.metric("net.bytes").unwrap(), &eth0), Some(MetricValue::Long(100)));
    let data = second.metric("net.bytes").unwrap();
    assert_eq!(sum_value(data, &eth0), Some(MetricValue::Long(75)));
    assert_eq!(data.start_ts, at(10));
    assert_eq!(data.end_ts, at(20));
}

#[test]
fn test_delta_reader_exports_only_current_cycle() {
    let config = ConfigBuilder::new()
        .reader("otlp", Temporality::Delta)
        .build()
        .unwrap();
    let pipeline = MetricPipeline::new(config).unwrap();
    let gauge = pipeline
        .create_observable_instrument(
            &TestInstrumentBuilder::new("worker.load")
                .kind(InstrumentType::ObservableGauge)
                .double()
                .build(),
        )
        .unwrap();
    let processes = pipeline
        .create_observable_instrument(
            &TestInstrumentBuilder::new("process.cpu.ticks")
                .kind(InstrumentType::ObservableCounter)
                .build(),
        )
        .unwrap();
    let cycle = Arc::new(AtomicI64::new(0));

    let gauge_cycle = Arc::clone(&cycle);
    gauge.add_callback(callback(move |result| {
        if gauge_cycle.load(Ordering::SeqCst) == 0 {
            result.observe_double(10.0, &attrs(&[("k", "a")]));
        }
        Ok(())
    }));
    let pid_cycle = Arc::clone(&cycle);
    processes.add_callback(callback(move |result| {
        let pid = pid_cycle.load(Ordering::SeqCst);
        result.observe_long(50, &MetricAttributes::new().with("pid", pid));
        Ok(())
    }));

    for tick in 0..6_u64 {
        let collection = pipeline.collect("otlp", at(10 * (tick + 1))).unwrap();
        cycle.fetch_add(1, Ordering::SeqCst);

        let load = collection.metric("worker.load").unwrap();
        if tick == 0 {
            assert_eq!(last_value(load, &attrs(&[("k", "a")])), Some(MetricValue::Double(10.0)));
        } else {
            assert!(load.points.is_empty());
        }
        assert_eq!(collection.metric("process.cpu.ticks").unwrap().points.len(), 1);
    }
}
