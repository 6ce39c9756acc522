//! 报文字节解包

use crate::layout::Layout;
use domain::DecodedValue;

/// 解包错误（结构性错误，整帧丢弃）。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid byte token '{0}'")]
    InvalidByte(String),
    #[error("unpack requires {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// 将十进制字节文本（0–255）转换为字节序列。
pub fn parse_bytes<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<u8>, DecodeError> {
    tokens
        .iter()
        .map(|token| {
            let token = token.as_ref();
            token
                .parse::<u8>()
                .map_err(|_| DecodeError::InvalidByte(token.to_string()))
        })
        .collect()
}

/// 按布局解包字节序列，结果顺序与布局声明顺序一致。
pub fn unpack(layout: &Layout, bytes: &[u8]) -> Result<Vec<DecodedValue>, DecodeError> {
    let expected = layout.byte_len();
    if bytes.len() != expected {
        return Err(DecodeError::LengthMismatch {
            expected,
            actual: bytes.len(),
        });
    }

    let mut values = Vec::with_capacity(layout.value_count());
    let mut offset = 0;
    for kind in layout.fields() {
        let end = offset + kind.size();
        if let Some(value) = kind.read(&bytes[offset..end]) {
            values.push(value);
        }
        offset = end;
    }
    Ok(values)
}

/// 解析字节文本并解包。
pub fn decode<S: AsRef<str>>(
    tokens: &[S],
    layout: &Layout,
) -> Result<Vec<DecodedValue>, DecodeError> {
    let bytes = parse_bytes(tokens)?;
    unpack(layout, &bytes)
}
