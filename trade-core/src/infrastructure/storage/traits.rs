use crate::domain::{RegistryKind, Trade};
use crate::foundation::TradeError;

pub type Result<T> = std::result::Result<T, TradeError>;

/// Persistence for the three trade collections. Each collection is saved
/// as a whole; the store holds nothing beyond the list of trades.
pub trait TradeStore: Send + Sync {
    fn load(&self, kind: RegistryKind) -> Result<Vec<Trade>>;
    fn save(&self, kind: RegistryKind, trades: &[Trade]) -> Result<()>;
}
