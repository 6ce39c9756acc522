//! HTTP 接口
//!
//! - GET /health：接收器运行中返回 200（附带 MQTT 连接状态），否则 503
//! - GET /metrics：运行计数快照
//! - POST /update：手动触发，清空变化缓存

use crate::service::Service;
use api_contract::{ApiResponse, HealthDto, MetricsDto, TriggerDto};
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use domain::TriggerSource;
use oem_telemetry::new_request_id;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/update", post(update))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 注入 request_id
        .layer(middleware::from_fn(request_context))
}

async fn health(State(state): State<AppState>) -> Response {
    if state.service.is_healthy() {
        (
            StatusCode::OK,
            Json(ApiResponse::success(HealthDto {
                alive: true,
                mqtt_connected: state.service.is_publisher_connected(),
            })),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::<HealthDto>::error(
                "SERVICE.UNAVAILABLE",
                "udp receiver is not running",
            )),
        )
            .into_response()
    }
}

async fn metrics(State(state): State<AppState>) -> Response {
    let snapshot = state.service.metrics();
    (
        StatusCode::OK,
        Json(ApiResponse::success(MetricsDto {
            received_messages: snapshot.received_messages,
            received_messages_errors: snapshot.received_messages_errors,
            throttled_messages: snapshot.throttled_messages,
            unconfigured_messages: snapshot.unconfigured_messages,
            published_values: snapshot.published_values,
            unchanged_values: snapshot.unchanged_values,
        })),
    )
        .into_response()
}

async fn update(State(state): State<AppState>) -> Response {
    let source = TriggerSource::Manual;
    let cleared = state.service.on_external_trigger(source).await;
    (
        StatusCode::OK,
        Json(ApiResponse::success(TriggerDto {
            source: source.to_string(),
            change_cache_cleared: cleared,
        })),
    )
        .into_response()
}

async fn request_context(req: Request<Body>, next: Next) -> Response {
    let request_id = new_request_id();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path()
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use oem_config::InMemoryNodeSettings;
    use oem_ingest::UdpSourceConfig;
    use oem_pipeline::{NoopPublisher, Pipeline, PipelineConfig};
    use oem_telemetry::TelemetryMetrics;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<Service>) {
        let pipeline = Pipeline::new(
            Arc::new(InMemoryNodeSettings::new()),
            Arc::new(NoopPublisher),
            PipelineConfig::default(),
        );
        let service = Arc::new(Service::new(
            UdpSourceConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            pipeline,
            Arc::new(TelemetryMetrics::new()),
        ));
        let router = create_router(AppState {
            service: service.clone(),
        });
        (router, service)
    }

    async fn send(router: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(request).await.expect("response");
        assert!(response.headers().contains_key("x-request-id"));
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    #[tokio::test]
    async fn health_reflects_receiver_state() {
        let (router, service) = app();
        let (status, body) = send(router.clone(), "GET", "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);

        service.start().await.expect("start");
        let (status, body) = send(router.clone(), "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["alive"], true);
        assert_eq!(body["data"]["mqttConnected"], true);

        service.stop().await;
        let (status, _) = send(router, "GET", "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn metrics_returns_counters() {
        let (router, _service) = app();
        let (status, body) = send(router, "GET", "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["receivedMessages"], 0);
        assert_eq!(body["data"]["receivedMessagesErrors"], 0);
    }

    #[tokio::test]
    async fn update_is_a_manual_trigger() {
        let (router, _service) = app();
        let (status, body) = send(router.clone(), "POST", "/update").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["source"], "manual");
        assert_eq!(body["data"]["changeCacheCleared"], true);

        let request = Request::builder()
            .method("GET")
            .uri("/update")
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
