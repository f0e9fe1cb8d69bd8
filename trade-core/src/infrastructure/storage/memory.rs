use crate::domain::{RegistryKind, Trade};
use crate::foundation::TradeError;
use crate::infrastructure::storage::TradeStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Default)]
pub struct MemoryTradeStore {
    inner: Arc<Mutex<HashMap<RegistryKind, Vec<Trade>>>>,
    save_count: Arc<Mutex<usize>>,
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, HashMap<RegistryKind, Vec<Trade>>>, TradeError> {
        self.inner.lock().map_err(|_| TradeError::StorageError {
            operation: "memory trade store lock".to_string(),
            details: "poisoned".to_string(),
        })
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.save_count.lock().map(|count| *count).unwrap_or(0)
    }
}

impl TradeStore for MemoryTradeStore {
    fn load(&self, kind: RegistryKind) -> Result<Vec<Trade>, TradeError> {
        Ok(self.lock_inner()?.get(&kind).cloned().unwrap_or_default())
    }

    fn save(&self, kind: RegistryKind, trades: &[Trade]) -> Result<(), TradeError> {
        self.lock_inner()?.insert(kind, trades.to_vec());
        if let Ok(mut count) = self.save_count.lock() {
            *count += 1;
        }
        Ok(())
    }
}
