pub mod model;
pub mod payload;
pub mod period;
pub mod role;
pub mod state_machine;

pub use model::{DisputeState, ParkedMessage, ProcessModel, Trade, TradeFees};
pub use payload::ProtocolPayload;
pub use period::TradePeriodState;
pub use role::{Capability, Position, Side, TradeRole};
pub use state_machine::TradeState;
