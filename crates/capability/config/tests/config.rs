use oem_config::{
    AppConfig, ConfigError, InMemoryNodeSettings, NodeSettings, parser_rule_key,
    parser_var_names_key, parser_var_scalers_key,
};

// 环境变量为进程级共享状态，相关断言放在同一个测试中顺序执行。
#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("UDP_PORT", "10001");
        std::env::set_var("CACHE_TIME", "60");
        std::env::set_var("MSG_THROTTLE_TIME", "2");
        std::env::set_var("INCLUDE_NODE_ID_TO_TOPIC", "False");
        std::env::set_var("MQTT_TOPIC_PREFIX", "home/oem");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.udp_port, 10001);
    assert_eq!(config.cache_time_seconds, 60);
    assert_eq!(config.msg_throttle_time_seconds, 2);
    assert!(!config.include_node_id_to_topic);
    assert_eq!(config.mqtt_topic_prefix, "home/oem");
    assert_eq!(config.cache_max_size, 256);
    assert_eq!(config.mqtt_port, 1883);

    unsafe {
        std::env::set_var("UDP_PORT", "not-a-port");
    }
    let err = AppConfig::from_env().expect_err("invalid port");
    assert!(matches!(err, ConfigError::Invalid(key, _) if key == "UDP_PORT"));

    unsafe {
        std::env::set_var("UDP_PORT", "9999");
        std::env::set_var("MQTT_QOS", "3");
    }
    let err = AppConfig::from_env().expect_err("invalid qos");
    assert_eq!(err.to_string(), "invalid value for MQTT_QOS: 3");

    unsafe {
        std::env::remove_var("MQTT_QOS");
    }
}

#[test]
fn node_keys_follow_naming() {
    assert_eq!(parser_rule_key(7), "MSG_PARSER_RULE_NODE_7");
    assert_eq!(parser_var_names_key(7), "MSG_PARSER_VAR_NAMES_NODE_7");
    assert_eq!(parser_var_scalers_key(7), "MSG_PARSER_VAR_SCALERS_NODE_7");
}

#[test]
fn in_memory_settings_lookup() {
    let settings = InMemoryNodeSettings::new().with_node(1, "B", "temp", "0.5");
    assert_eq!(settings.get("MSG_PARSER_RULE_NODE_1").as_deref(), Some("B"));
    assert_eq!(settings.get("MSG_PARSER_VAR_NAMES_NODE_1").as_deref(), Some("temp"));
    assert_eq!(settings.get("MSG_PARSER_VAR_SCALERS_NODE_1").as_deref(), Some("0.5"));
    assert!(settings.get("MSG_PARSER_RULE_NODE_2").is_none());
}
