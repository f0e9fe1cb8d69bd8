//! Configuration loader using Figment for layered config management.
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. TOML config file
//! 3. Environment variables (TRADE_* prefix)

use crate::foundation::TradeError;
use crate::infrastructure::config::types::AppConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::path::Path;
use tracing::{debug, info};

pub const CONFIG_FILE_NAME: &str = "trade-config.toml";

/// Environment variable prefix for config overrides.
///
/// Example: `TRADE_TRADE__MAX_UNCONFIRMED_TXS` -> `trade.max_unconfirmed_txs`
const ENV_PREFIX: &str = "TRADE_";

/// Load configuration from the default file in `data_dir` (`trade-config.toml`).
pub fn load_config(data_dir: &Path) -> Result<AppConfig, TradeError> {
    let config_path = data_dir.join(CONFIG_FILE_NAME);
    load_config_from_file(&config_path, data_dir)
}

/// Load configuration from a specific file path.
pub fn load_config_from_file(path: &Path, data_dir: &Path) -> Result<AppConfig, TradeError> {
    info!(path = %path.display(), data_dir = %data_dir.display(), "loading configuration");
    let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
    if path.exists() {
        figment = figment.merge(Toml::file(path));
    } else {
        debug!(path = %path.display(), "configuration file missing; using defaults and env only");
    }
    let figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
    let mut config: AppConfig = figment.extract()?;
    postprocess(&mut config, data_dir);
    debug!(
        data_dir = %config.service.data_dir,
        max_unconfirmed_txs = config.trade.max_unconfirmed_txs,
        max_trade_period_secs = config.trade.max_trade_period_secs,
        allow_faulty_delayed_txs = config.trade.allow_faulty_delayed_txs,
        "configuration loaded"
    );
    Ok(config)
}

fn postprocess(config: &mut AppConfig, data_dir: &Path) {
    if config.service.data_dir.trim().is_empty() {
        config.service.data_dir = data_dir.to_string_lossy().to_string();
    }
    if config.service.log_dir.as_deref().is_some_and(|dir| dir.trim().is_empty()) {
        config.service.log_dir = None;
    }
}
