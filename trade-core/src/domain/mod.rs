pub mod address;
pub mod offer;
pub mod registry;
pub mod trade;
pub mod transaction;

pub use address::{AddressContext, AddressEntry};
pub use offer::{Direction, Offer, OfferState, OpenOffer, OpenOfferBook};
pub use registry::{RegistryKind, TradeRegistry};
pub use trade::{
    Capability, DisputeState, ParkedMessage, Position, ProcessModel, ProtocolPayload, Side, Trade, TradeFees, TradePeriodState,
    TradeRole, TradeState,
};
pub use transaction::{SignedTransaction, TxConfidence, TxKind, TxOutput, TxTemplate};
