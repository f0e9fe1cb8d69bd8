use crate::foundation::constants::{
    DEFAULT_DEDUP_CAPACITY, DEFAULT_MAX_TRADE_PERIOD_SECS, DEFAULT_MAX_UNCONFIRMED_TXS, DEFAULT_PERIOD_CHECK_INTERVAL_SECS,
};
use serde::{Deserialize, Serialize};

/// Process-level settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub data_dir: String,
    /// Directory for rolling log files. Console only when unset.
    #[serde(default)]
    pub log_dir: Option<String>,
    /// `<level>`, `root=<level>` or `<crate>=<level>` entries.
    #[serde(default)]
    pub log_filters: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeConfig {
    /// Take-offer is refused while the wallet has more unconfirmed transactions than this.
    #[serde(default = "default_max_unconfirmed_txs")]
    pub max_unconfirmed_txs: u32,
    #[serde(default = "default_max_trade_period_secs")]
    pub max_trade_period_secs: u64,
    #[serde(default = "default_period_check_interval_secs")]
    pub period_check_interval_secs: u64,
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    /// Accept deposit notifications that lack a delayed payout transaction.
    #[serde(default)]
    pub allow_faulty_delayed_txs: bool,
}

fn default_max_unconfirmed_txs() -> u32 {
    DEFAULT_MAX_UNCONFIRMED_TXS
}

fn default_max_trade_period_secs() -> u64 {
    DEFAULT_MAX_TRADE_PERIOD_SECS
}

fn default_period_check_interval_secs() -> u64 {
    DEFAULT_PERIOD_CHECK_INTERVAL_SECS
}

fn default_dedup_capacity() -> usize {
    DEFAULT_DEDUP_CAPACITY
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            max_unconfirmed_txs: DEFAULT_MAX_UNCONFIRMED_TXS,
            max_trade_period_secs: DEFAULT_MAX_TRADE_PERIOD_SECS,
            period_check_interval_secs: DEFAULT_PERIOD_CHECK_INTERVAL_SECS,
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            allow_faulty_delayed_txs: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub trade: TradeConfig,
}
