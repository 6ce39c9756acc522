//! oem2mqtt：接收节点 UDP 报文，解码后发布到 MQTT，并提供健康检查/指标/手动触发接口。

mod routes;
mod service;

use oem_config::{AppConfig, EnvNodeSettings};
use oem_publish::{MqttPublisher, MqttPublisherConfig};
use oem_telemetry::{TelemetryMetrics, init_tracing};
use routes::{AppState, create_router};
use service::Service;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // MQTT 发布器（后台 eventloop 负责连接与重连）
    let (publisher, mqtt_handle) = MqttPublisher::connect(MqttPublisherConfig {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        client_id: config.mqtt_client_id.clone(),
        topic_prefix: config.mqtt_topic_prefix.clone(),
        qos: config.mqtt_qos,
    })?;
    info!(
        "mqtt publisher: {}:{} prefix={}",
        config.mqtt_host, config.mqtt_port, config.mqtt_topic_prefix
    );

    let metrics = Arc::new(TelemetryMetrics::new());
    let service = Arc::new(Service::from_config(
        &config,
        Arc::new(EnvNodeSettings),
        Arc::new(publisher),
        metrics,
    ));
    // 绑定失败直接退出
    let udp_addr = service.start().await?;

    let app = create_router(AppState {
        service: service.clone(),
    });
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(%udp_addr, http_addr = %config.http_addr, "oem2mqtt started");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.stop().await;
    mqtt_handle.abort();
    info!("oem2mqtt stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}
