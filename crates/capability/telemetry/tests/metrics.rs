use oem_telemetry::{MetricsSnapshot, TelemetryMetrics, new_request_id};

#[test]
fn request_id_non_empty() {
    let first = new_request_id();
    let second = new_request_id();
    assert!(!first.is_empty());
    assert_ne!(first, second);
}

#[test]
fn counters_accumulate() {
    let metrics = TelemetryMetrics::new();
    assert_eq!(metrics.snapshot(), MetricsSnapshot::default());

    metrics.record_received();
    metrics.record_received();
    metrics.record_error();
    metrics.record_throttled();
    metrics.record_unconfigured();
    metrics.record_published(3);
    metrics.record_unchanged(2);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.received_messages, 2);
    assert_eq!(snapshot.received_messages_errors, 1);
    assert_eq!(snapshot.throttled_messages, 1);
    assert_eq!(snapshot.unconfigured_messages, 1);
    assert_eq!(snapshot.published_values, 3);
    assert_eq!(snapshot.unchanged_values, 2);
}
