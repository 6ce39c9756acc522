use domain::RawFrame;
use oem_config::InMemoryNodeSettings;
use oem_pipeline::{FrameOutcome, Pipeline, PipelineConfig};
use oem_publish::{MqttPublisher, MqttPublisherConfig};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn frame_completes_while_broker_is_unreachable() {
    let (publisher, handle) = MqttPublisher::connect(MqttPublisherConfig {
        port: 1,
        ..MqttPublisherConfig::default()
    })
    .expect("client");
    let names = (0..12)
        .map(|index| format!("f{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let scalers = vec!["1"; 12].join(", ");
    let settings = InMemoryNodeSettings::new().with_node(1, "12B", &names, &scalers);
    let pipeline = Pipeline::new(
        Arc::new(settings),
        Arc::new(publisher),
        PipelineConfig {
            throttle_ttl: Duration::ZERO,
            ..PipelineConfig::default()
        },
    );
    let frame = || RawFrame {
        node_id: 1,
        tokens: (0..12).map(|value| value.to_string()).collect(),
        received_at_ms: 1,
    };

    for _ in 0..3 {
        let outcome = tokio::time::timeout(Duration::from_secs(3), pipeline.handle_frame(frame()))
            .await
            .expect("frame must complete without a broker")
            .expect("processed");
        let FrameOutcome::Processed(summary) = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert!(summary.failed > 0);
        assert_eq!(summary.published + summary.unchanged + summary.failed, 12);
    }
    assert!(!pipeline.publisher_connected());

    // 手动触发同样不会被阻塞
    tokio::time::timeout(Duration::from_secs(1), pipeline.clear_change_cache())
        .await
        .expect("change cache cleared");
    handle.abort();
}
