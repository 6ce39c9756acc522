//! MQTT 发布：把缩放后的字段值以文本形式发布到 `<prefix>/<topic>`。

use async_trait::async_trait;
use domain::ScaledValue;
use oem_pipeline::{PublishError, ValuePublisher};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 发往 eventloop 的请求队列容量。
const REQUEST_QUEUE_CAPACITY: usize = 10;

/// MQTT Publisher 配置。
#[derive(Debug, Clone)]
pub struct MqttPublisherConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// client id 前缀，实际 id 追加随机后缀。
    pub client_id: String,
    pub topic_prefix: String,
    pub qos: u8,
}

impl Default for MqttPublisherConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            username: None,
            password: None,
            client_id: "oem2mqtt".to_string(),
            topic_prefix: "oem2mqtt".to_string(),
            qos: 1,
        }
    }
}

/// MQTT Publisher 实现。
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    topic_prefix: String,
    qos: QoS,
    connected: Arc<AtomicBool>,
}

impl MqttPublisher {
    /// 创建客户端并启动 eventloop 任务；连接在后台建立，断线后自动重连。
    pub fn connect(
        config: MqttPublisherConfig,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), PublishError> {
        if config.host.trim().is_empty() {
            return Err(PublishError::NotConnected(
                "mqtt broker host is empty".to_string(),
            ));
        }
        let client_id = format!("{}-{}", config.client_id, uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (config.username, config.password) {
            options.set_credentials(username, password);
        }
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));

        let state = connected.clone();
        let host = config.host;
        let port = config.port;
        let handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        state.store(true, Ordering::Relaxed);
                        info!(target: "oem.publish", %host, port, %client_id, "connected to mqtt broker");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        if state.swap(false, Ordering::Relaxed) {
                            warn!(target: "oem.publish", %host, port, "mqtt connection lost");
                        }
                        warn!(target: "oem.publish", "mqtt publish eventloop error: {}", err);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Ok((
            Self {
                client,
                topic_prefix: config.topic_prefix,
                qos: qos_from_u8(config.qos),
                connected,
            },
            handle,
        ))
    }

    fn topic_for(&self, topic: &str) -> String {
        prefixed_topic(&self.topic_prefix, topic)
    }
}

#[async_trait]
impl ValuePublisher for MqttPublisher {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn publish(
        &self,
        topic: &str,
        value: ScaledValue,
        retain: bool,
    ) -> Result<(), PublishError> {
        let topic = self.topic_for(topic);
        let payload = value.to_string();
        debug!(
            target: "oem.publish",
            topic = %topic,
            payload = %payload,
            retain,
            "value_publish"
        );
        // 请求队列满或 eventloop 已退出时立即返回错误，不阻塞调用方。
        self.client
            .try_publish(topic, self.qos, retain, payload)
            .map_err(|err| PublishError::Publish(err.to_string()))
    }
}

fn prefixed_topic(prefix: &str, topic: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let topic = topic.trim_start_matches('/');
    if prefix.is_empty() {
        topic.to_string()
    } else {
        format!("{}/{}", prefix, topic)
    }
}

fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}
