pub mod data;

pub use data::{DecodedValue, RawFrame, ScaledValue};

/// 传感器节点标识（报文首个字段）。
pub type NodeId = u32;

/// 更新触发来源。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// 周期触发（仅记录日志）。
    Interval,
    /// 手动触发：清空变化缓存，强制全量重新发布。
    Manual,
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerSource::Interval => f.write_str("interval"),
            TriggerSource::Manual => f.write_str("manual"),
        }
    }
}
