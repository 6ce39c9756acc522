//! 应用运行配置加载。

use std::collections::HashMap;
use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub udp_port: u16,
    pub cache_time_seconds: u64,
    pub msg_throttle_time_seconds: u64,
    pub cache_max_size: usize,
    pub include_node_id_to_topic: bool,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_client_id: String,
    pub mqtt_topic_prefix: String,
    pub mqtt_qos: u8,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let udp_port = read_u16_with_default("UDP_PORT", 9999)?;
        let cache_time_seconds = read_u64_with_default("CACHE_TIME", 300)?;
        let msg_throttle_time_seconds = read_u64_with_default("MSG_THROTTLE_TIME", 5)?;
        let cache_max_size = read_u64_with_default("CACHE_MAX_SIZE", 256)? as usize;
        let include_node_id_to_topic = read_bool_with_default("INCLUDE_NODE_ID_TO_TOPIC", true);
        let mqtt_host = env::var("MQTT_BROKER_URL").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default("MQTT_BROKER_PORT", 1883)?;
        let mqtt_username = read_optional("MQTT_USERNAME");
        let mqtt_password = read_optional("MQTT_PASSWORD");
        let mqtt_client_id =
            read_optional("MQTT_CLIENT_ID").unwrap_or_else(|| "oem2mqtt".to_string());
        let mqtt_topic_prefix =
            env::var("MQTT_TOPIC_PREFIX").unwrap_or_else(|_| "oem2mqtt".to_string());
        let mqtt_qos = read_u8_with_default("MQTT_QOS", 1)?;
        if mqtt_qos > 2 {
            return Err(ConfigError::Invalid(
                "MQTT_QOS".to_string(),
                mqtt_qos.to_string(),
            ));
        }

        Ok(Self {
            http_addr,
            udp_port,
            cache_time_seconds,
            msg_throttle_time_seconds,
            cache_max_size,
            include_node_id_to_topic,
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_client_id,
            mqtt_topic_prefix,
            mqtt_qos,
        })
    }
}

/// 节点解析规则（布局字符串）的配置键。
pub fn parser_rule_key(node_id: u32) -> String {
    format!("MSG_PARSER_RULE_NODE_{}", node_id)
}

/// 节点字段名列表的配置键。
pub fn parser_var_names_key(node_id: u32) -> String {
    format!("MSG_PARSER_VAR_NAMES_NODE_{}", node_id)
}

/// 节点字段缩放系数列表的配置键。
pub fn parser_var_scalers_key(node_id: u32) -> String {
    format!("MSG_PARSER_VAR_SCALERS_NODE_{}", node_id)
}

/// 按键查询的节点配置来源。
///
/// 节点相关配置（解析规则、字段名、缩放系数）在编译期未知，按节点 ID 拼出键后查询。
pub trait NodeSettings: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// 基于进程环境变量的节点配置。
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvNodeSettings;

impl NodeSettings for EnvNodeSettings {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

/// 内存节点配置（用于测试与占位）。
#[derive(Debug, Default, Clone)]
pub struct InMemoryNodeSettings {
    values: HashMap<String, String>,
}

impl InMemoryNodeSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// 一次性写入某个节点的三项解析配置。
    pub fn with_node(self, node_id: u32, rule: &str, names: &str, scalers: &str) -> Self {
        self.with(parser_rule_key(node_id), rule)
            .with(parser_var_names_key(node_id), names)
            .with(parser_var_scalers_key(node_id), scalers)
    }
}

impl NodeSettings for InMemoryNodeSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .trim()
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "on"
        ),
        Err(_) => default,
    }
}
