//! 报文处理管线：节流 → 解析规则 → 解包 → 缩放 → 变化过滤 → 发布。
//!
//! 解析规则缓存与两个 TTL 缓存都属于 [`Pipeline`] 实例，整帧处理期间持有同一把锁。

mod cache;

pub use cache::TtlCache;

use async_trait::async_trait;
use domain::{NodeId, RawFrame, ScaledValue};
use oem_config::NodeSettings;
use oem_normalize::{DecodeError, SchemaError, SchemaResolver, decode, scale_value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Pipeline 处理错误（结构性错误，整帧丢弃）。
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("field count mismatch: values={values}, names={names}, scalers={scalers}")]
    LengthMismatch {
        values: usize,
        names: usize,
        scalers: usize,
    },
}

/// 发布错误。
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publish error: {0}")]
    Publish(String),
    #[error("not connected: {0}")]
    NotConnected(String),
}

/// 数值发布器抽象。
///
/// `publish` 不应等待下游连接恢复；无法投递时返回错误，由调用方在下一帧重试。
#[async_trait]
pub trait ValuePublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        value: ScaledValue,
        retain: bool,
    ) -> Result<(), PublishError>;

    /// 下游连接状态，用于健康检查。
    fn is_connected(&self) -> bool {
        true
    }
}

/// 空发布器（用于接线与测试）。
#[derive(Debug, Default)]
pub struct NoopPublisher;

#[async_trait]
impl ValuePublisher for NoopPublisher {
    async fn publish(
        &self,
        _topic: &str,
        _value: ScaledValue,
        _retain: bool,
    ) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Pipeline 参数。
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 同一节点报文的节流窗口。
    pub throttle_ttl: Duration,
    /// 未变化的字段值在该窗口内不重复发布。
    pub change_ttl: Duration,
    /// 每个 TTL 缓存的最大条目数。
    pub max_entries: usize,
    pub include_node_id_in_topic: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            throttle_ttl: Duration::from_secs(5),
            change_ttl: Duration::from_secs(300),
            max_entries: 256,
            include_node_id_in_topic: true,
        }
    }
}

/// 单帧字段分发统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutSummary {
    pub published: usize,
    pub unchanged: usize,
    pub unnamed: usize,
    pub failed: usize,
}

/// 单帧处理结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// 节流窗口内的重复报文。
    Throttled,
    /// 节点未配置解析规则。
    Unconfigured,
    Processed(FanoutSummary),
}

struct PipelineState {
    resolver: SchemaResolver,
    throttle: TtlCache<NodeId, Vec<String>>,
    changes: TtlCache<String, ScaledValue>,
}

struct PipelineInner {
    publisher: Arc<dyn ValuePublisher>,
    config: PipelineConfig,
    state: Mutex<PipelineState>,
}

/// Pipeline 入口。
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

impl Pipeline {
    pub fn new(
        settings: Arc<dyn NodeSettings>,
        publisher: Arc<dyn ValuePublisher>,
        config: PipelineConfig,
    ) -> Self {
        let state = PipelineState {
            resolver: SchemaResolver::new(settings),
            throttle: TtlCache::new(config.max_entries, config.throttle_ttl),
            changes: TtlCache::new(config.max_entries, config.change_ttl),
        };
        Self {
            inner: Arc::new(PipelineInner {
                publisher,
                config,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn publisher_connected(&self) -> bool {
        self.inner.publisher.is_connected()
    }

    /// 处理一帧报文。节流条目仅在整帧处理完成后写入。
    pub async fn handle_frame(&self, frame: RawFrame) -> Result<FrameOutcome, PipelineError> {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        let node_id = frame.node_id;

        if state.throttle.contains_key(&node_id) {
            debug!(target: "oem.pipeline", node_id, "Skip message parsing for node id");
            return Ok(FrameOutcome::Throttled);
        }

        let Some(schema) = state.resolver.resolve(node_id)? else {
            debug!(target: "oem.pipeline", node_id, "No parser rule for node id");
            return Ok(FrameOutcome::Unconfigured);
        };

        let values = decode(frame.tokens.as_slice(), &schema.layout)?;
        if values.len() != schema.names.len() || values.len() != schema.scales.len() {
            debug!(
                target: "oem.pipeline",
                node_id,
                values = values.len(),
                names = schema.names.len(),
                scalers = schema.scales.len(),
                "Array lengths do not match"
            );
            return Err(PipelineError::LengthMismatch {
                values: values.len(),
                names: schema.names.len(),
                scalers: schema.scales.len(),
            });
        }

        let mut summary = FanoutSummary::default();
        for ((raw, name), scale) in values.iter().zip(schema.names.iter()).zip(schema.scales.iter())
        {
            let value = scale_value(*raw, *scale);
            debug!(
                target: "oem.pipeline",
                node_id,
                field = %name,
                raw = %raw,
                scale,
                value = %value,
                "field scaled"
            );
            if name.is_empty() {
                debug!(target: "oem.pipeline", node_id, "Skip message publishing as name is empty");
                summary.unnamed += 1;
                continue;
            }
            self.publish_if_changed(&mut state.changes, node_id, name, value, &mut summary)
                .await;
        }

        state.throttle.insert(node_id, frame.tokens);
        Ok(FrameOutcome::Processed(summary))
    }

    /// 清空变化缓存，之后每个字段都会重新发布一次。
    pub async fn clear_change_cache(&self) {
        let mut state = self.inner.state.lock().await;
        state.changes.clear();
        info!(target: "oem.pipeline", "change cache cleared");
    }

    /// 发布主题：`node<id>/<name>` 或 `<name>`。
    pub fn topic_for(&self, node_id: NodeId, name: &str) -> String {
        if self.inner.config.include_node_id_in_topic {
            format!("node{}/{}", node_id, name)
        } else {
            name.to_string()
        }
    }

    async fn publish_if_changed(
        &self,
        changes: &mut TtlCache<String, ScaledValue>,
        node_id: NodeId,
        name: &str,
        value: ScaledValue,
        summary: &mut FanoutSummary,
    ) {
        // 缓存按字段名（不含节点）记录；跳过时不刷新 TTL。
        let key = name.to_string();
        match changes.get(&key) {
            Some(previous) if *previous == value => {
                debug!(target: "oem.pipeline", field = name, %value, "Skip publishing unchanged value");
                summary.unchanged += 1;
                return;
            }
            Some(_) => {}
            None => debug!(target: "oem.pipeline", field = name, "No cache value available"),
        }

        info!(target: "oem.pipeline", "{} = {}", name, value);
        let topic = self.topic_for(node_id, name);
        match self.inner.publisher.publish(&topic, value, false).await {
            Ok(()) => {
                changes.insert(key, value);
                summary.published += 1;
            }
            Err(err) => {
                warn!(target: "oem.pipeline", topic = %topic, error = %err, "publish failed");
                summary.failed += 1;
            }
        }
    }
}
