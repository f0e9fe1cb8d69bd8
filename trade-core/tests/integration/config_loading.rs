use std::env;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;
use trade_core::foundation::TradeError;
use trade_core::infrastructure::config::persistence::write_config_file;
use trade_core::infrastructure::config::{load_app_config_from_path, load_config_from_file, AppConfig, CONFIG_FILE_NAME};

fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().expect("env lock")
}

const SAMPLE_TOML: &str = r#"
[service]
data_dir = "/var/lib/trade"
log_filters = ["info", "trade_core=debug"]

[trade]
max_unconfirmed_txs = 5
allow_faulty_delayed_txs = true
"#;

#[test]
fn test_config_loading_when_toml_and_env_then_env_wins() {
    let _guard = lock_env();
    let data_dir = TempDir::new().expect("temp data dir");
    let path = data_dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, SAMPLE_TOML).expect("write config");

    env::set_var("TRADE_TRADE__DEDUP_CAPACITY", "42");
    env::set_var("TRADE_TRADE__MAX_UNCONFIRMED_TXS", "7");
    let loaded = load_config_from_file(&path, data_dir.path());
    env::remove_var("TRADE_TRADE__MAX_UNCONFIRMED_TXS");
    env::remove_var("TRADE_TRADE__DEDUP_CAPACITY");
    let config = loaded.expect("load config");

    assert_eq!(config.service.data_dir, "/var/lib/trade");
    assert_eq!(config.service.log_filters, vec!["info".to_string(), "trade_core=debug".to_string()]);
    assert_eq!(config.trade.max_unconfirmed_txs, 7);
    assert_eq!(config.trade.dedup_capacity, 42);
    assert!(config.trade.allow_faulty_delayed_txs);
    assert_eq!(config.trade.max_trade_period_secs, AppConfig::default().trade.max_trade_period_secs);
}

#[test]
fn test_config_loading_when_file_missing_then_defaults_with_data_dir() {
    let _guard = lock_env();
    let data_dir = TempDir::new().expect("temp data dir");

    let config = load_config_from_file(&data_dir.path().join(CONFIG_FILE_NAME), data_dir.path()).expect("load defaults");

    assert_eq!(config.service.data_dir, data_dir.path().to_string_lossy());
    assert_eq!(config.trade, AppConfig::default().trade);
    assert_eq!(config.validate(), Ok(()));
}

#[test]
fn test_config_loading_when_values_invalid_then_config_error() {
    let _guard = lock_env();
    let data_dir = TempDir::new().expect("temp data dir");
    let path = data_dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "[trade]\nperiod_check_interval_secs = 0\ndedup_capacity = 0\n").expect("write config");

    let err = load_app_config_from_path(&path, data_dir.path()).expect_err("invalid config");
    match err {
        TradeError::ConfigError(message) => {
            assert!(message.contains("period_check_interval_secs"), "{message}");
            assert!(message.contains("dedup_capacity"), "{message}");
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn test_config_persistence_when_written_then_loads_back_identical() {
    let _guard = lock_env();
    let data_dir = TempDir::new().expect("temp data dir");
    let path = data_dir.path().join("nested").join(CONFIG_FILE_NAME);

    let mut config = AppConfig::default();
    config.service.data_dir = data_dir.path().to_string_lossy().to_string();
    config.service.log_dir = Some("/var/log/trade".to_string());
    config.trade.period_check_interval_secs = 15;
    write_config_file(&path, &config).expect("write config");

    let loaded = load_config_from_file(&path, data_dir.path()).expect("load config");
    assert_eq!(loaded, config);
}
