//! Two-thread stress runs through the public harness.
//!
//! The short-tier runs are part of the normal suite. Long-tier and repeated
//! runs are ignored by default:
//! ```bash
//! cargo test --release -p owq --test stress -- --ignored --nocapture
//! ```
//!
//! With tracing:
//! ```bash
//! RUST_LOG=owq=debug cargo test --features tracing --test stress -- --nocapture
//! ```

use std::sync::Once;

use owq::placement::CpuConfig;
use owq::stress::{self, DEFAULT_COUNT, Exit, StressConfig, StressError};

static INIT_TRACING: Once = Once::new();

/// Initialize tracing for tests (only once).
fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        owq::init_tracing();
    });
}

#[test]
#[serial_test::serial]
fn short_int_queue_delivers_every_value_in_order() {
    init_test_tracing();

    let config = StressConfig::short("Shortq int");
    assert_eq!(config.capacity, 10);
    assert_eq!(config.count, 1_048_576);

    let report = stress::run::<i32>(&config).expect("stress run failed");
    assert_eq!(report.producer, Exit::Completed);
    assert_eq!(report.consumer, Exit::Completed);
    assert_eq!(report.enqueued, DEFAULT_COUNT);
    assert_eq!(report.dequeued, DEFAULT_COUNT);
}

#[test]
#[serial_test::serial]
fn short_double_queue_delivers_every_value_in_order() {
    init_test_tracing();

    let config = StressConfig::short("Shortq double").with_count(1 << 18);
    let report = stress::run::<f64>(&config).expect("stress run failed");
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(report.dequeued, 1 << 18);
}

#[test]
#[serial_test::serial]
fn single_slot_queue_survives_contention() {
    init_test_tracing();

    let config = StressConfig {
        capacity: 1,
        ..StressConfig::short("single slot").with_count(1 << 16)
    };
    let report = stress::run::<u64>(&config).expect("stress run failed");
    assert!(report.is_clean(), "{report:?}");
}

#[test]
#[serial_test::serial]
fn pinned_run_is_clean() {
    init_test_tracing();

    let config = StressConfig::short("pinned")
        .with_count(1 << 16)
        .with_placement(CpuConfig::Auto);
    let report = stress::run::<i64>(&config).expect("stress run failed");
    assert!(report.is_clean(), "{report:?}");
}

#[test]
#[serial_test::serial]
fn zero_capacity_fails_before_spawning() {
    let config = StressConfig {
        capacity: 0,
        ..StressConfig::short("empty")
    };
    let err = stress::run::<i32>(&config).unwrap_err();
    assert!(matches!(err, StressError::Construction(_)));
    assert_eq!(err.to_string(), "cannot build queue: queue capacity must be greater than 0");
}

#[test]
#[ignore]
#[serial_test::serial]
fn long_queues_deliver_every_value_in_order() {
    init_test_tracing();

    let int_report = stress::run::<i32>(&StressConfig::long("Longq int")).expect("int run failed");
    assert!(int_report.is_clean(), "{int_report:?}");

    let double_report =
        stress::run::<f64>(&StressConfig::long("Longq double")).expect("double run failed");
    assert!(double_report.is_clean(), "{double_report:?}");

    println!(
        "Longq int: {} ops/ms, Longq double: {} ops/ms",
        int_report.throughput_per_ms(),
        double_report.throughput_per_ms()
    );
}

#[test]
#[ignore]
#[serial_test::serial]
fn repeated_short_runs_stay_clean() {
    init_test_tracing();

    for run in 0..16 {
        let config = StressConfig::short(format!("Shortq int run {run}"));
        let report = stress::run::<i32>(&config).expect("stress run failed");
        assert!(report.is_clean(), "{report:?}");
    }
}
