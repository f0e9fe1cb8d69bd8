use crate::domain::trade::Trade;
use crate::foundation::{TradeError, TradeId};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistryKind {
    Pending,
    Closed,
    Failed,
}

impl RegistryKind {
    pub const ALL: [RegistryKind; 3] = [RegistryKind::Pending, RegistryKind::Closed, RegistryKind::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryKind::Pending => "pending",
            RegistryKind::Closed => "closed",
            RegistryKind::Failed => "failed",
        }
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three disjoint trade collections. A trade id lives in at most one of
/// them; every method preserves that.
#[derive(Debug, Default)]
pub struct TradeRegistry {
    pending: BTreeMap<TradeId, Trade>,
    closed: BTreeMap<TradeId, Trade>,
    failed: BTreeMap<TradeId, Trade>,
}

impl TradeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, kind: RegistryKind) -> &BTreeMap<TradeId, Trade> {
        match kind {
            RegistryKind::Pending => &self.pending,
            RegistryKind::Closed => &self.closed,
            RegistryKind::Failed => &self.failed,
        }
    }

    fn collection_mut(&mut self, kind: RegistryKind) -> &mut BTreeMap<TradeId, Trade> {
        match kind {
            RegistryKind::Pending => &mut self.pending,
            RegistryKind::Closed => &mut self.closed,
            RegistryKind::Failed => &mut self.failed,
        }
    }

    pub fn kind_of(&self, trade_id: &TradeId) -> Option<RegistryKind> {
        RegistryKind::ALL.into_iter().find(|kind| self.collection(*kind).contains_key(trade_id))
    }

    /// True iff the id is a member of any collection.
    pub fn contains(&self, trade_id: &TradeId) -> bool {
        self.kind_of(trade_id).is_some()
    }

    pub fn get(&self, trade_id: &TradeId) -> Option<&Trade> {
        let kind = self.kind_of(trade_id)?;
        self.collection(kind).get(trade_id)
    }

    pub fn get_mut(&mut self, trade_id: &TradeId) -> Option<&mut Trade> {
        let kind = self.kind_of(trade_id)?;
        self.collection_mut(kind).get_mut(trade_id)
    }

    pub fn pending_mut(&mut self, trade_id: &TradeId) -> Option<&mut Trade> {
        self.pending.get_mut(trade_id)
    }

    pub fn trades(&self, kind: RegistryKind) -> impl Iterator<Item = &Trade> {
        self.collection(kind).values()
    }

    pub fn pending_ids(&self) -> Vec<TradeId> {
        self.pending.keys().cloned().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn len(&self, kind: RegistryKind) -> usize {
        self.collection(kind).len()
    }

    pub fn snapshot(&self, kind: RegistryKind) -> Vec<Trade> {
        self.collection(kind).values().cloned().collect()
    }

    /// Replaces a collection with persisted contents. Ids already present in
    /// another collection are rejected.
    pub fn load(&mut self, kind: RegistryKind, trades: Vec<Trade>) -> Result<(), TradeError> {
        let mut loaded = BTreeMap::new();
        for mut trade in trades {
            trade.initialized = false;
            if let Some(existing) = self.kind_of(&trade.id).filter(|existing| *existing != kind) {
                return Err(TradeError::DuplicateTrade { trade_id: trade.id.to_string(), registry: existing.to_string() });
            }
            loaded.insert(trade.id.clone(), trade);
        }
        debug!("registry loaded kind={} count={}", kind, loaded.len());
        *self.collection_mut(kind) = loaded;
        Ok(())
    }

    pub fn add(&mut self, trade: Trade) -> Result<(), TradeError> {
        if let Some(existing) = self.kind_of(&trade.id) {
            return Err(TradeError::DuplicateTrade { trade_id: trade.id.to_string(), registry: existing.to_string() });
        }
        info!("trade added to pending trade_id={} role={}", trade.id, trade.role);
        self.pending.insert(trade.id.clone(), trade);
        Ok(())
    }

    pub fn remove(&mut self, trade_id: &TradeId) -> Result<Trade, TradeError> {
        let trade = self.pending.remove(trade_id).ok_or_else(|| TradeError::TradeNotFound(trade_id.to_string()))?;
        info!("trade removed from pending trade_id={}", trade_id);
        Ok(trade)
    }

    /// Moves a pending or failed trade to Closed. Returns the source
    /// collection, or `None` when the trade was already closed.
    pub fn move_to_closed(&mut self, trade_id: &TradeId) -> Result<Option<RegistryKind>, TradeError> {
        match self.kind_of(trade_id) {
            None => Err(TradeError::TradeNotFound(trade_id.to_string())),
            Some(RegistryKind::Closed) => {
                debug!("trade already closed trade_id={}", trade_id);
                Ok(None)
            }
            Some(from) => {
                self.relocate(trade_id, from, RegistryKind::Closed)?;
                Ok(Some(from))
            }
        }
    }

    /// Moves a pending trade to Failed. Returns false when it was already failed.
    pub fn move_to_failed(&mut self, trade_id: &TradeId) -> Result<bool, TradeError> {
        match self.kind_of(trade_id) {
            None => Err(TradeError::TradeNotFound(trade_id.to_string())),
            Some(RegistryKind::Failed) => Ok(false),
            Some(RegistryKind::Closed) => Err(TradeError::InvalidStateTransition {
                from: RegistryKind::Closed.to_string(),
                to: RegistryKind::Failed.to_string(),
            }),
            Some(RegistryKind::Pending) => {
                self.relocate(trade_id, RegistryKind::Pending, RegistryKind::Failed)?;
                Ok(true)
            }
        }
    }

    pub fn move_failed_to_pending(&mut self, trade_id: &TradeId) -> Result<(), TradeError> {
        self.relocate(trade_id, RegistryKind::Failed, RegistryKind::Pending)
    }

    fn relocate(&mut self, trade_id: &TradeId, from: RegistryKind, to: RegistryKind) -> Result<(), TradeError> {
        let trade = self.collection_mut(from).remove(trade_id).ok_or_else(|| TradeError::TradeNotFound(trade_id.to_string()))?;
        info!("trade relocated trade_id={} from={} to={}", trade_id, from, to);
        self.collection_mut(to).insert(trade_id.clone(), trade);
        Ok(())
    }
}
