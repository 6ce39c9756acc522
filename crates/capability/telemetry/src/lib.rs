//! 追踪初始化、请求 ID 生成与报文计数指标。

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub received_messages: u64,
    pub received_messages_errors: u64,
    pub throttled_messages: u64,
    pub unconfigured_messages: u64,
    pub published_values: u64,
    pub unchanged_values: u64,
}

/// 报文处理计数器。
///
/// 由接收循环与流水线递增，由 HTTP `/metrics` 读取。
#[derive(Debug, Default)]
pub struct TelemetryMetrics {
    received_messages: AtomicU64,
    received_messages_errors: AtomicU64,
    throttled_messages: AtomicU64,
    unconfigured_messages: AtomicU64,
    published_values: AtomicU64,
    unchanged_values: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received_messages: self.received_messages.load(Ordering::Relaxed),
            received_messages_errors: self.received_messages_errors.load(Ordering::Relaxed),
            throttled_messages: self.throttled_messages.load(Ordering::Relaxed),
            unconfigured_messages: self.unconfigured_messages.load(Ordering::Relaxed),
            published_values: self.published_values.load(Ordering::Relaxed),
            unchanged_values: self.unchanged_values.load(Ordering::Relaxed),
        }
    }

    /// 记录 UDP 报文接收次数（含空报文）。
    pub fn record_received(&self) {
        self.received_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录报文处理失败次数。
    pub fn record_error(&self) {
        self.received_messages_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录节流丢弃次数。
    pub fn record_throttled(&self) {
        self.throttled_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录未配置节点丢弃次数。
    pub fn record_unconfigured(&self) {
        self.unconfigured_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录发布次数。
    pub fn record_published(&self, count: u64) {
        self.published_values.fetch_add(count, Ordering::Relaxed);
    }

    /// 记录值未变化跳过发布次数。
    pub fn record_unchanged(&self, count: u64) {
        self.unchanged_values.fetch_add(count, Ordering::Relaxed);
    }
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id。
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
