//! 二进制布局描述
//!
//! 节点解析规则使用紧凑的结构体格式串描述，每个字符对应一个字段，
//! 字符前可带十进制重复次数。字节序固定为小端。
//!
//! | 字符 | 类型 | 字节 |
//! |------|------|------|
//! | `x` | 填充字节（不产生值） | 1 |
//! | `?` | bool | 1 |
//! | `b` / `B` | i8 / u8 | 1 |
//! | `h` / `H` | i16 / u16 | 2 |
//! | `i` / `I`, `l` / `L` | i32 / u32 | 4 |
//! | `q` / `Q` | i64 / u64 | 8 |
//! | `f` / `d` | f32 / f64 | 4 / 8 |
//!
//! 例：`<B2hH` 表示 1 个 u8、2 个 i16、1 个 u16，共 7 字节。

use domain::DecodedValue;
use std::fmt;

/// 小端前缀。
const LITTLE_ENDIAN: char = '<';

/// 布局总字节上限（UDP 报文本身远小于此值）。
const MAX_LAYOUT_BYTES: usize = 65_536;

/// 布局解析错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("unsupported byte order marker '{0}'")]
    ByteOrder(char),
    #[error("unknown field code '{0}'")]
    UnknownCode(char),
    #[error("repeat count without field code")]
    DanglingCount,
    #[error("repeat count too large")]
    CountOverflow,
    #[error("layout exceeds 65536 bytes")]
    TooLong,
}

/// 单个字段的类型与宽度。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Pad,
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl FieldKind {
    fn from_code(code: char) -> Option<Self> {
        let kind = match code {
            'x' => FieldKind::Pad,
            '?' => FieldKind::Bool,
            'b' => FieldKind::I8,
            'B' => FieldKind::U8,
            'h' => FieldKind::I16,
            'H' => FieldKind::U16,
            'i' | 'l' => FieldKind::I32,
            'I' | 'L' => FieldKind::U32,
            'q' => FieldKind::I64,
            'Q' => FieldKind::U64,
            'f' => FieldKind::F32,
            'd' => FieldKind::F64,
            _ => return None,
        };
        Some(kind)
    }

    fn code(&self) -> char {
        match self {
            FieldKind::Pad => 'x',
            FieldKind::Bool => '?',
            FieldKind::I8 => 'b',
            FieldKind::U8 => 'B',
            FieldKind::I16 => 'h',
            FieldKind::U16 => 'H',
            FieldKind::I32 => 'i',
            FieldKind::U32 => 'I',
            FieldKind::I64 => 'q',
            FieldKind::U64 => 'Q',
            FieldKind::F32 => 'f',
            FieldKind::F64 => 'd',
        }
    }

    /// 字段占用的字节数。
    pub fn size(&self) -> usize {
        match self {
            FieldKind::Pad | FieldKind::Bool | FieldKind::I8 | FieldKind::U8 => 1,
            FieldKind::I16 | FieldKind::U16 => 2,
            FieldKind::I32 | FieldKind::U32 | FieldKind::F32 => 4,
            FieldKind::I64 | FieldKind::U64 | FieldKind::F64 => 8,
        }
    }

    /// 填充字节不产生值。
    pub fn yields_value(&self) -> bool {
        !matches!(self, FieldKind::Pad)
    }

    /// 按小端读取一个字段；`bytes` 长度必须等于 `size()`。
    pub(crate) fn read(&self, bytes: &[u8]) -> Option<DecodedValue> {
        let value = match self {
            FieldKind::Pad => return None,
            FieldKind::Bool => DecodedValue::Integer(i64::from(bytes[0] != 0)),
            FieldKind::I8 => DecodedValue::Integer(i64::from(bytes[0] as i8)),
            FieldKind::U8 => DecodedValue::Integer(i64::from(bytes[0])),
            FieldKind::I16 => DecodedValue::Integer(i64::from(i16::from_le_bytes(array(bytes)?))),
            FieldKind::U16 => DecodedValue::Integer(i64::from(u16::from_le_bytes(array(bytes)?))),
            FieldKind::I32 => DecodedValue::Integer(i64::from(i32::from_le_bytes(array(bytes)?))),
            FieldKind::U32 => DecodedValue::Integer(i64::from(u32::from_le_bytes(array(bytes)?))),
            FieldKind::I64 => DecodedValue::Integer(i64::from_le_bytes(array(bytes)?)),
            FieldKind::U64 => {
                let raw = u64::from_le_bytes(array(bytes)?);
                match i64::try_from(raw) {
                    Ok(value) => DecodedValue::Integer(value),
                    Err(_) => DecodedValue::Unsigned(raw),
                }
            }
            FieldKind::F32 => DecodedValue::Float(f64::from(f32::from_le_bytes(array(bytes)?))),
            FieldKind::F64 => DecodedValue::Float(f64::from_le_bytes(array(bytes)?)),
        };
        Some(value)
    }
}

fn array<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    bytes.try_into().ok()
}

/// 已解析的节点布局（字段按声明顺序展开）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    fields: Vec<FieldKind>,
}

impl Layout {
    /// 解析规范化后的布局串（可带一个 `<` 前缀）。
    pub fn parse(text: &str) -> Result<Self, LayoutError> {
        let body = text.strip_prefix(LITTLE_ENDIAN).unwrap_or(text);
        let mut fields = Vec::new();
        let mut total_bytes = 0usize;
        let mut count: Option<usize> = None;
        for ch in body.chars() {
            if let Some(digit) = ch.to_digit(10) {
                let current = count.unwrap_or(0);
                count = Some(
                    current
                        .checked_mul(10)
                        .and_then(|value| value.checked_add(digit as usize))
                        .ok_or(LayoutError::CountOverflow)?,
                );
                continue;
            }
            if matches!(ch, '<' | '>' | '!' | '=' | '@') {
                return Err(LayoutError::ByteOrder(ch));
            }
            let kind = FieldKind::from_code(ch).ok_or(LayoutError::UnknownCode(ch))?;
            let repeat = count.take().unwrap_or(1);
            total_bytes = repeat
                .checked_mul(kind.size())
                .and_then(|bytes| bytes.checked_add(total_bytes))
                .filter(|bytes| *bytes <= MAX_LAYOUT_BYTES)
                .ok_or(LayoutError::TooLong)?;
            fields.extend(std::iter::repeat_n(kind, repeat));
        }
        if count.is_some() {
            return Err(LayoutError::DanglingCount);
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldKind] {
        &self.fields
    }

    /// 报文需要的总字节数。
    pub fn byte_len(&self) -> usize {
        self.fields.iter().map(FieldKind::size).sum()
    }

    /// 解包后产生的值个数（不含填充字节）。
    pub fn value_count(&self) -> usize {
        self.fields.iter().filter(|kind| kind.yields_value()).count()
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", LITTLE_ENDIAN)?;
        for kind in &self.fields {
            write!(f, "{}", kind.code())?;
        }
        Ok(())
    }
}

/// 规范化配置中的布局串：去掉空格与逗号，并强制小端前缀。
pub fn normalize_rule(raw: &str) -> String {
    let compact: String = raw.chars().filter(|ch| *ch != ' ' && *ch != ',').collect();
    let compact = compact.strip_prefix(LITTLE_ENDIAN).unwrap_or(&compact);
    format!("{}{}", LITTLE_ENDIAN, compact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_expands_counts() {
        let layout = Layout::parse("<B2hH").unwrap();
        assert_eq!(
            layout.fields(),
            &[FieldKind::U8, FieldKind::I16, FieldKind::I16, FieldKind::U16]
        );
        assert_eq!(layout.byte_len(), 7);
        assert_eq!(layout.value_count(), 4);
    }

    #[test]
    fn pad_bytes_take_space_without_values() {
        let layout = Layout::parse("<3xB").unwrap();
        assert_eq!(layout.byte_len(), 4);
        assert_eq!(layout.value_count(), 1);
    }

    #[test]
    fn zero_count_yields_nothing() {
        let layout = Layout::parse("<0hB").unwrap();
        assert_eq!(layout.fields(), &[FieldKind::U8]);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(Layout::parse("<Bz"), Err(LayoutError::UnknownCode('z')));
        assert_eq!(Layout::parse("<B>"), Err(LayoutError::ByteOrder('>')));
        assert_eq!(Layout::parse(">B"), Err(LayoutError::ByteOrder('>')));
        assert_eq!(Layout::parse("<B3"), Err(LayoutError::DanglingCount));
        assert_eq!(
            Layout::parse("<99999999999999999999999B"),
            Err(LayoutError::CountOverflow)
        );
        assert_eq!(Layout::parse("<100000q"), Err(LayoutError::TooLong));
    }

    #[test]
    fn normalize_strips_separators() {
        assert_eq!(normalize_rule("B, h, h"), "<Bhh");
        assert_eq!(normalize_rule(" < H,H "), "<HH");
        assert_eq!(normalize_rule(""), "<");
    }

    #[test]
    fn display_round_trips_normalized_text() {
        let layout = Layout::parse("<2Bl").unwrap();
        assert_eq!(layout.to_string(), "<BBi");
    }
}
