use api_contract::{ApiResponse, HealthDto, MetricsDto, TriggerDto};
use serde_json::Value;

#[test]
fn api_response_success() {
    let response = ApiResponse::success(HealthDto {
        alive: true,
        mqtt_connected: false,
    });
    assert!(response.success);
    assert!(response.error.is_none());
    let value = serde_json::to_value(response).expect("serialize");
    assert_eq!(value["data"]["alive"], Value::Bool(true));
    assert_eq!(value["data"]["mqttConnected"], Value::Bool(false));
}

#[test]
fn api_response_error() {
    let response = ApiResponse::<HealthDto>::error("SERVICE.UNHEALTHY", "receiver stopped");
    assert!(!response.success);
    assert!(response.data.is_none());
    let value = serde_json::to_value(response).expect("serialize");
    assert_eq!(value["error"]["code"], "SERVICE.UNHEALTHY");
    assert_eq!(value["data"], Value::Null);
}

#[test]
fn metrics_dto_is_camel_case() {
    let value = serde_json::to_value(MetricsDto {
        received_messages: 3,
        received_messages_errors: 1,
        ..MetricsDto::default()
    })
    .expect("serialize");
    assert_eq!(value["receivedMessages"], 3);
    assert_eq!(value["receivedMessagesErrors"], 1);
    assert!(value.get("received_messages").is_none());
}

#[test]
fn trigger_dto_is_camel_case() {
    let value = serde_json::to_value(TriggerDto {
        source: "manual".to_string(),
        change_cache_cleared: true,
    })
    .expect("serialize");
    assert_eq!(value["changeCacheCleared"], true);
}
