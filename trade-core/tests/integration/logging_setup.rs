use tempfile::TempDir;
use trade_core::infrastructure::logging::{init_logger, ERR_LOG_FILE_NAME, LOG_FILE_NAME};

#[test]
fn test_logger_when_log_dir_given_then_rolling_files_created() {
    let log_dir = TempDir::new().expect("temp log dir");
    let dir = log_dir.path().join("logs");

    init_logger(dir.to_str(), "info,rocksdb=warn").expect("init logger");
    log::info!("logger initialized log_dir={}", dir.display());

    assert!(dir.join(LOG_FILE_NAME).exists());
    assert!(dir.join(ERR_LOG_FILE_NAME).exists());
}
