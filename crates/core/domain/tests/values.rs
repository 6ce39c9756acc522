use domain::{DecodedValue, ScaledValue, TriggerSource};

#[test]
fn scaled_value_compares_numerically() {
    assert_eq!(ScaledValue::Integer(3), ScaledValue::Decimal(3.0));
    assert_eq!(ScaledValue::Integer(10), ScaledValue::Integer(10));
    assert_ne!(ScaledValue::Decimal(2.31), ScaledValue::Decimal(2.3));
}

#[test]
fn scaled_value_renders_like_published_text() {
    assert_eq!(ScaledValue::Integer(10).to_string(), "10");
    assert_eq!(ScaledValue::Decimal(3.0).to_string(), "3.0");
    assert_eq!(ScaledValue::Decimal(2.31).to_string(), "2.31");
    assert_eq!(ScaledValue::Integer(-5).to_string(), "-5");
}

#[test]
fn decoded_value_as_f64() {
    assert_eq!(DecodedValue::Integer(-2).as_f64(), -2.0);
    assert_eq!(DecodedValue::Unsigned(u64::MAX).as_f64(), u64::MAX as f64);
    assert_eq!(DecodedValue::Float(1.5).to_string(), "1.5");
}

#[test]
fn trigger_source_display() {
    assert_eq!(TriggerSource::Manual.to_string(), "manual");
    assert_eq!(TriggerSource::Interval.to_string(), "interval");
}
