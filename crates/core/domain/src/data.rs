use crate::NodeId;
use std::fmt;

/// 解析后的 UDP 报文：节点 ID 与其后的字节字段（十进制文本）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub node_id: NodeId,
    pub tokens: Vec<String>,
    pub received_at_ms: i64,
}

/// 按布局解包得到的原始字段值。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodedValue {
    Integer(i64),
    /// 超出 i64 范围的 64 位无符号字段。
    Unsigned(u64),
    Float(f64),
}

impl DecodedValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            DecodedValue::Integer(v) => *v as f64,
            DecodedValue::Unsigned(v) => *v as f64,
            DecodedValue::Float(v) => *v,
        }
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Integer(v) => write!(f, "{}", v),
            DecodedValue::Unsigned(v) => write!(f, "{}", v),
            DecodedValue::Float(v) => write!(f, "{:?}", v),
        }
    }
}

/// 缩放后的发布值。
///
/// 比较按数值进行：`Integer(3) == Decimal(3.0)`。
#[derive(Debug, Clone, Copy)]
pub enum ScaledValue {
    Integer(i64),
    Decimal(f64),
}

impl ScaledValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            ScaledValue::Integer(v) => *v as f64,
            ScaledValue::Decimal(v) => *v,
        }
    }
}

impl PartialEq for ScaledValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ScaledValue::Integer(a), ScaledValue::Integer(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl fmt::Display for ScaledValue {
    /// 整数不带小数位，小数始终带小数位（`3.0`、`2.31`）。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaledValue::Integer(v) => write!(f, "{}", v),
            ScaledValue::Decimal(v) => write!(f, "{:?}", v),
        }
    }
}
