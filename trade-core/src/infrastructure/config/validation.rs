use crate::infrastructure::config::types::AppConfig;
use crate::infrastructure::logging::parse_log_filter;

const MAX_PERIOD_CHECK_INTERVAL_SECS: u64 = 3_600;

impl AppConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.service.data_dir.trim().is_empty() {
            errors.push("service.data_dir must not be empty".to_string());
        }
        for filter in &self.service.log_filters {
            if parse_log_filter(filter).is_none() {
                errors.push(format!("invalid service.log_filters entry: {}", filter));
            }
        }

        if self.trade.max_trade_period_secs == 0 {
            errors.push("trade.max_trade_period_secs must be > 0".to_string());
        }
        if self.trade.period_check_interval_secs == 0 {
            errors.push("trade.period_check_interval_secs must be > 0".to_string());
        }
        if self.trade.period_check_interval_secs > MAX_PERIOD_CHECK_INTERVAL_SECS {
            errors.push(format!("trade.period_check_interval_secs should not exceed {}", MAX_PERIOD_CHECK_INTERVAL_SECS));
        }
        if self.trade.dedup_capacity == 0 {
            errors.push("trade.dedup_capacity must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
