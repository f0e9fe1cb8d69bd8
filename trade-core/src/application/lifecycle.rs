use crate::domain::{RegistryKind, Trade, TradePeriodState};
use crate::foundation::{TradeError, TradeId};
use log::{debug, info, trace, warn};
use std::sync::Arc;

/// Change notifications for registry membership and trade progress.
pub trait TradeLifecycleObserver: Send + Sync {
    fn on_trade_added(&self, _trade: &Trade) {}
    /// `destination` is the collection the trade left Pending for, or `None` when it was dropped.
    fn on_trade_removed(&self, _trade_id: &TradeId, _destination: Option<RegistryKind>) {}
    fn on_pending_count_changed(&self, _count: usize) {}
    fn on_period_state_changed(&self, _trade_id: &TradeId, _period_state: TradePeriodState) {}
    fn on_take_offer_request_error(&self, _trade_id: &TradeId, _error: &TradeError) {}
}

pub struct NoopObserver;

impl TradeLifecycleObserver for NoopObserver {}

pub struct CompositeObserver {
    observers: Vec<Arc<dyn TradeLifecycleObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub fn add_observer(&mut self, observer: Arc<dyn TradeLifecycleObserver>) {
        self.observers.push(observer);
    }
}

impl Default for CompositeObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl TradeLifecycleObserver for CompositeObserver {
    fn on_trade_added(&self, trade: &Trade) {
        trace!("on_trade_added dispatch observer_count={} trade_id={}", self.observers.len(), trade.id);
        for (idx, observer) in self.observers.iter().enumerate() {
            trace!("on_trade_added calling observer observer_index={}", idx);
            observer.on_trade_added(trade);
        }
    }

    fn on_trade_removed(&self, trade_id: &TradeId, destination: Option<RegistryKind>) {
        trace!("on_trade_removed dispatch observer_count={} trade_id={}", self.observers.len(), trade_id);
        for observer in &self.observers {
            observer.on_trade_removed(trade_id, destination);
        }
    }

    fn on_pending_count_changed(&self, count: usize) {
        debug!("pending trade count changed count={}", count);
        for observer in &self.observers {
            observer.on_pending_count_changed(count);
        }
    }

    fn on_period_state_changed(&self, trade_id: &TradeId, period_state: TradePeriodState) {
        info!("trade period state changed trade_id={} period_state={:?}", trade_id, period_state);
        for observer in &self.observers {
            observer.on_period_state_changed(trade_id, period_state);
        }
    }

    fn on_take_offer_request_error(&self, trade_id: &TradeId, error: &TradeError) {
        warn!("take offer request failed trade_id={} error={}", trade_id, error);
        for observer in &self.observers {
            observer.on_take_offer_request_error(trade_id, error);
        }
    }
}
