//! Application layer: orchestration of domain rules over wallet, transport and storage.

pub mod funds;
pub mod lifecycle;
pub mod protocol;
pub mod router;
pub mod service;
pub mod trade_manager;

pub use funds::{FundCoordinator, TradeAddresses};
pub use lifecycle::{CompositeObserver, NoopObserver, TradeLifecycleObserver};
pub use router::MessageDeduplicator;
pub use service::{run_trade_loop, spawn_trade_loop, TradeCommand, TradeManagerHandle};
pub use trade_manager::{TakeOfferParams, TradeManager};
