use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Maker,
    Taker,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buyer,
    Seller,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    HandleIncomingTakeRequest,
    InitiateTake,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeRole {
    pub position: Position,
    pub side: Side,
}

impl TradeRole {
    pub const MAKER_BUYER: TradeRole = TradeRole { position: Position::Maker, side: Side::Buyer };
    pub const MAKER_SELLER: TradeRole = TradeRole { position: Position::Maker, side: Side::Seller };
    pub const TAKER_BUYER: TradeRole = TradeRole { position: Position::Taker, side: Side::Buyer };
    pub const TAKER_SELLER: TradeRole = TradeRole { position: Position::Taker, side: Side::Seller };

    /// Role for the local party: a buy offer makes its maker the buyer and its
    /// taker the seller.
    pub fn for_offer(offer_is_buy: bool, position: Position) -> Self {
        let is_taker = position == Position::Taker;
        let side = if offer_is_buy ^ is_taker { Side::Buyer } else { Side::Seller };
        Self { position, side }
    }

    pub fn is_maker(&self) -> bool {
        self.position == Position::Maker
    }

    pub fn is_buyer(&self) -> bool {
        self.side == Side::Buyer
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        match self.position {
            Position::Maker => &[Capability::HandleIncomingTakeRequest],
            Position::Taker => &[Capability::InitiateTake],
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl fmt::Display for TradeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{:?}", self.position, self.side)
    }
}

/// Whether the local party buys in a trade on `offer_is_buy`.
pub fn is_buyer(offer_is_buy: bool, is_my_offer: bool) -> bool {
    let position = if is_my_offer { Position::Maker } else { Position::Taker };
    TradeRole::for_offer(offer_is_buy, position).is_buyer()
}
