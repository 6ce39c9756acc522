//! 数值缩放

use domain::{DecodedValue, ScaledValue};

/// 对原始值应用缩放系数。
///
/// - `scale == 1`：原值不变；
/// - 乘积没有小数部分：转为整数；
/// - 否则保留两位小数。
pub fn scale_value(raw: DecodedValue, scale: f64) -> ScaledValue {
    if scale == 1.0 {
        return match raw {
            DecodedValue::Integer(value) => ScaledValue::Integer(value),
            DecodedValue::Unsigned(value) => match i64::try_from(value) {
                Ok(value) => ScaledValue::Integer(value),
                Err(_) => ScaledValue::Decimal(value as f64),
            },
            DecodedValue::Float(value) => ScaledValue::Decimal(value),
        };
    }

    let product = raw.as_f64() * scale;
    if product % 1.0 == 0.0 && product.abs() < i64::MAX as f64 {
        ScaledValue::Integer(product as i64)
    } else {
        ScaledValue::Decimal(round2(product))
    }
}

/// 按十进制保留两位小数（格式化走精确十进制舍入）。
fn round2(value: f64) -> f64 {
    format!("{:.2}", value).parse::<f64>().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_scale_keeps_raw() {
        assert_eq!(
            scale_value(DecodedValue::Integer(1234), 1.0),
            ScaledValue::Integer(1234)
        );
        assert!(matches!(
            scale_value(DecodedValue::Integer(7), 1.0),
            ScaledValue::Integer(7)
        ));
        assert!(matches!(
            scale_value(DecodedValue::Float(1.234), 1.0),
            ScaledValue::Decimal(v) if v == 1.234
        ));
    }

    #[test]
    fn integral_product_becomes_integer() {
        assert!(matches!(
            scale_value(DecodedValue::Integer(100), 0.1),
            ScaledValue::Integer(10)
        ));
        assert!(matches!(
            scale_value(DecodedValue::Integer(20), 0.5),
            ScaledValue::Integer(10)
        ));
        assert!(matches!(
            scale_value(DecodedValue::Integer(-4), 0.25),
            ScaledValue::Integer(-1)
        ));
    }

    #[test]
    fn fractional_product_rounds_to_two_decimals() {
        // 10 * 0.3 = 3.0000000000000004
        let value = scale_value(DecodedValue::Integer(10), 0.3);
        assert!(matches!(value, ScaledValue::Decimal(v) if v == 3.0));
        assert_eq!(value.to_string(), "3.0");

        let value = scale_value(DecodedValue::Integer(7), 0.33);
        assert!(matches!(value, ScaledValue::Decimal(v) if v == 2.31));
        assert_eq!(value.to_string(), "2.31");

        let value = scale_value(DecodedValue::Integer(3), 0.042);
        assert!(matches!(value, ScaledValue::Decimal(v) if v == 0.13));
    }

    #[test]
    fn zero_scale_yields_integer_zero() {
        assert!(matches!(
            scale_value(DecodedValue::Integer(55), 0.0),
            ScaledValue::Integer(0)
        ));
    }
}
