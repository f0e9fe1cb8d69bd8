use crate::foundation::TradeError;
use crate::infrastructure::config::types::AppConfig;
use crate::storage_err;
use std::path::Path;

/// Writes `config` as TOML, creating parent directories as needed.
pub fn write_config_file(path: &Path, config: &AppConfig) -> Result<(), TradeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| storage_err!("create config dir", err))?;
    }
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents).map_err(|err| storage_err!("write config file", err))
}
