use super::*;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = EventsConfig::default();
    assert_eq!(config.alarm_clock.thread_name, "alarm-clock");
    assert_eq!(config.alarm_clock.stack_size, 128 * 1024);
    assert!(config.handlers.is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn test_handler_defaults() {
    let handler = HandlerConfig::new("wallet-manager");
    assert_eq!(handler.stack_size, 512 * 1024);
    assert_eq!(handler.queue_capacity, 64);
    assert_eq!(handler.thread_name(), "wallet-manager");
}

#[test]
fn test_thread_name_truncated() {
    let handler = HandlerConfig::new("a-very-long-handler-name-for-the-ethereum-light-node");
    assert_eq!(handler.thread_name().chars().count(), MAX_THREAD_NAME_LEN);
    assert!(handler.thread_name().starts_with("a-very-long-handler-name"));
}

#[test]
fn test_load_handlers() {
    let content = r#"
        [alarm_clock]
        thread_name = "timers"

        [[handlers]]
        name = "wallet-manager"
        stack_size = 1048576

        [[handlers]]
        name = "peer-manager"
        queue_capacity = 16
    "#;
    let config: EventsConfig = ConfigLoader::load_str(content).unwrap();
    assert_eq!(config.alarm_clock.thread_name, "timers");
    assert_eq!(config.alarm_clock.stack_size, 128 * 1024);

    let wallet = config.handler("wallet-manager").unwrap();
    assert_eq!(wallet.stack_size, 1048576);
    assert_eq!(wallet.queue_capacity, 64);

    let peer = config.handler_or_default("peer-manager");
    assert_eq!(peer.queue_capacity, 16);

    let missing = config.handler_or_default("ripple");
    assert_eq!(missing.name, "ripple");
    assert_eq!(missing.stack_size, 512 * 1024);
}

#[test]
fn test_load_empty_config() {
    let config: EventsConfig = ConfigLoader::load_str("").unwrap();
    assert!(config.handlers.is_empty());
}

#[test]
fn test_env_var_expansion() {
    // SAFETY: the variable name is unique to this test.
    unsafe { std::env::set_var("WALLETCORE_TEST_HANDLER_NAME", "btc-manager") };
    let content = r#"
        [[handlers]]
        name = "${WALLETCORE_TEST_HANDLER_NAME}"
    "#;
    let config: EventsConfig = ConfigLoader::load_str(content).unwrap();
    assert_eq!(config.handlers[0].name, "btc-manager");
}

#[test]
fn test_env_var_missing() {
    let content = r#"
        [[handlers]]
        name = "${WALLETCORE_TEST_UNSET_VARIABLE}"
    "#;
    let err = ConfigLoader::load_str::<EventsConfig>(content).unwrap_err();
    assert!(matches!(err, ConfigError::EnvVarNotSet(ref v) if v == "WALLETCORE_TEST_UNSET_VARIABLE"));
}

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[[handlers]]\nname = \"eth-manager\"\nqueue_capacity = 8").unwrap();

    let config: EventsConfig = ConfigLoader::load(file.path()).unwrap();
    assert_eq!(config.handlers[0].name, "eth-manager");
    assert_eq!(config.handlers[0].queue_capacity, 8);
}

#[test]
fn test_load_missing_file() {
    let err = ConfigLoader::load::<EventsConfig>(Path::new("/nonexistent/walletcore.toml"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
}

#[test]
fn test_invalid_toml() {
    let err = ConfigLoader::load_str::<EventsConfig>("handlers = 3").unwrap_err();
    assert!(matches!(err, ConfigError::TomlParse(_)));
}

#[test]
fn test_validate_rejects_zero_stack() {
    let config = EventsConfig {
        handlers: vec![HandlerConfig::new("wallet-manager").with_stack_size(0)],
        ..Default::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("stack_size"));
}

#[test]
fn test_validate_rejects_empty_name() {
    let config = EventsConfig {
        handlers: vec![HandlerConfig::new("  ")],
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_config_serialization() {
    let config = EventsConfig {
        handlers: vec![HandlerConfig::new("peer-manager").with_queue_capacity(4)],
        ..Default::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    let parsed: EventsConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.handlers[0].name, "peer-manager");
    assert_eq!(parsed.handlers[0].queue_capacity, 4);
}
