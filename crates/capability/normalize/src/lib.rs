//! # 数据标准化能力模块
//!
//! 将节点上报的字节字段按节点解析规则转换为物理量：
//!
//! ```text
//! RawFrame.tokens ──parse_bytes──► [u8] ──unpack(Layout)──► [DecodedValue]
//!                                                               │
//!                                          scale_value(scale) ──┘──► ScaledValue
//! ```
//!
//! 解析规则来自配置（`MSG_PARSER_RULE_NODE_<id>` 等），由 [`SchemaResolver`] 按节点缓存。

mod decode;
mod layout;
mod scale;
mod schema;

pub use decode::{DecodeError, decode, parse_bytes, unpack};
pub use layout::{FieldKind, Layout, LayoutError, normalize_rule};
pub use scale::scale_value;
pub use schema::{Schema, SchemaError, SchemaResolver};
