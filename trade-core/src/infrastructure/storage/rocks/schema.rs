use crate::domain::RegistryKind;

pub const CF_DEFAULT: &str = "default";
pub const CF_METADATA: &str = "metadata";
pub const CF_PENDING_TRADES: &str = "pending_trades";
pub const CF_CLOSED_TRADES: &str = "closed_trades";
pub const CF_FAILED_TRADES: &str = "failed_trades";

pub const KEY_SCHEMA_VERSION: &[u8] = b"schema_version";
pub const SCHEMA_VERSION: u32 = 1;

pub const DB_DIR_NAME: &str = "trades";

pub fn cf_for(kind: RegistryKind) -> &'static str {
    match kind {
        RegistryKind::Pending => CF_PENDING_TRADES,
        RegistryKind::Closed => CF_CLOSED_TRADES,
        RegistryKind::Failed => CF_FAILED_TRADES,
    }
}
