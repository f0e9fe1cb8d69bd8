use crate::foundation::{TradeId, WalletAddress};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AddressContext {
    MultiSig,
    TradePayout,
    Arbitrator,
    OfferFunding,
}

impl AddressContext {
    /// Contexts a trade holds while it runs.
    pub const TRADE: [AddressContext; 2] = [AddressContext::MultiSig, AddressContext::TradePayout];
}

impl fmt::Display for AddressContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A wallet address, either available or owned by one trade under one context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub address: WalletAddress,
    pub owner: Option<(TradeId, AddressContext)>,
}

impl AddressEntry {
    pub fn available(address: WalletAddress) -> Self {
        Self { address, owner: None }
    }

    pub fn owned(address: WalletAddress, trade_id: TradeId, context: AddressContext) -> Self {
        Self { address, owner: Some((trade_id, context)) }
    }

    pub fn is_available(&self) -> bool {
        self.owner.is_none()
    }

    pub fn trade_id(&self) -> Option<&TradeId> {
        self.owner.as_ref().map(|(trade_id, _)| trade_id)
    }

    pub fn context(&self) -> Option<AddressContext> {
        self.owner.as_ref().map(|(_, context)| *context)
    }

    pub fn is_owned_by(&self, trade_id: &TradeId, context: AddressContext) -> bool {
        matches!(&self.owner, Some((owner, ctx)) if owner == trade_id && *ctx == context)
    }
}
