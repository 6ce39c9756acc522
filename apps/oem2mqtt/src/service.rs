//! 服务装配：UDP 接收器 + 处理管线 + 运行计数。
//!
//! 对外暴露启停、健康检查与外部触发；HTTP 层只依赖这里的 [`Service`]。

use domain::{RawFrame, TriggerSource};
use oem_config::{AppConfig, NodeSettings};
use oem_ingest::{FrameHandler, IngestError, UdpReceiver, UdpSourceConfig};
use oem_pipeline::{FrameOutcome, Pipeline, PipelineConfig, ValuePublisher};
use oem_telemetry::{MetricsSnapshot, TelemetryMetrics};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// 管线处理器：把单帧结果映射为计数。
struct PipelineHandler {
    pipeline: Pipeline,
    metrics: Arc<TelemetryMetrics>,
}

#[async_trait::async_trait]
impl FrameHandler for PipelineHandler {
    async fn handle(&self, frame: RawFrame) -> Result<(), IngestError> {
        let node_id = frame.node_id;
        match self.pipeline.handle_frame(frame).await {
            Ok(FrameOutcome::Throttled) => self.metrics.record_throttled(),
            Ok(FrameOutcome::Unconfigured) => self.metrics.record_unconfigured(),
            Ok(FrameOutcome::Processed(summary)) => {
                self.metrics.record_published(summary.published as u64);
                self.metrics.record_unchanged(summary.unchanged as u64);
                debug!(
                    target: "oem.ingest",
                    node_id,
                    published = summary.published,
                    unchanged = summary.unchanged,
                    unnamed = summary.unnamed,
                    failed = summary.failed,
                    "frame_processed"
                );
            }
            Err(err) => return Err(IngestError::Handler(Box::new(err))),
        }
        Ok(())
    }
}

/// 服务入口。
pub struct Service {
    pipeline: Pipeline,
    receiver: UdpReceiver,
    metrics: Arc<TelemetryMetrics>,
}

impl Service {
    pub fn new(
        source: UdpSourceConfig,
        pipeline: Pipeline,
        metrics: Arc<TelemetryMetrics>,
    ) -> Self {
        let handler = Arc::new(PipelineHandler {
            pipeline: pipeline.clone(),
            metrics: metrics.clone(),
        });
        let receiver = UdpReceiver::new(source, handler, metrics.clone());
        Self {
            pipeline,
            receiver,
            metrics,
        }
    }

    /// 按运行配置装配服务。
    pub fn from_config(
        config: &AppConfig,
        settings: Arc<dyn NodeSettings>,
        publisher: Arc<dyn ValuePublisher>,
        metrics: Arc<TelemetryMetrics>,
    ) -> Self {
        let pipeline = Pipeline::new(
            settings,
            publisher,
            PipelineConfig {
                throttle_ttl: Duration::from_secs(config.msg_throttle_time_seconds),
                change_ttl: Duration::from_secs(config.cache_time_seconds),
                max_entries: config.cache_max_size,
                include_node_id_in_topic: config.include_node_id_to_topic,
            },
        );
        let source = UdpSourceConfig {
            port: config.udp_port,
            ..UdpSourceConfig::default()
        };
        Self::new(source, pipeline, metrics)
    }

    pub async fn start(&self) -> Result<SocketAddr, IngestError> {
        self.receiver.start().await
    }

    pub async fn stop(&self) {
        self.receiver.stop().await;
    }

    pub fn is_healthy(&self) -> bool {
        self.receiver.is_healthy()
    }

    pub fn is_publisher_connected(&self) -> bool {
        self.pipeline.publisher_connected()
    }

    /// 外部触发；返回是否清空了变化缓存。
    pub async fn on_external_trigger(&self, source: TriggerSource) -> bool {
        info!(target: "oem.ingest", %source, "Update triggered");
        match source {
            TriggerSource::Manual => {
                self.pipeline.clear_change_cache().await;
                true
            }
            TriggerSource::Interval => false,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
