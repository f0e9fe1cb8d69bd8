use crate::foundation::{PeerAddress, TradeError, TradeId};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: TradeId,
    pub direction: Direction,
    pub amount_sat: u64,
    pub price: u64,
    pub buyer_security_deposit_sat: u64,
    pub seller_security_deposit_sat: u64,
    pub maker_address: PeerAddress,
}

impl Offer {
    pub fn is_buy_offer(&self) -> bool {
        self.direction == Direction::Buy
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferState {
    Available,
    Reserved,
    Closed,
}

impl fmt::Display for OfferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOffer {
    pub offer: Offer,
    pub state: OfferState,
    pub arbitrator_address: Option<PeerAddress>,
    pub mediator_address: Option<PeerAddress>,
}

impl OpenOffer {
    pub fn new(offer: Offer) -> Self {
        Self { offer, state: OfferState::Available, arbitrator_address: None, mediator_address: None }
    }

    pub fn is_available(&self) -> bool {
        self.state == OfferState::Available
    }
}

/// Maker-side offers awaiting a taker.
#[derive(Debug, Default)]
pub struct OpenOfferBook {
    offers: BTreeMap<TradeId, OpenOffer>,
}

impl OpenOfferBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adding an id already in the book is a conflict; the existing entry keeps its state.
    pub fn add(&mut self, open_offer: OpenOffer) -> Result<(), TradeError> {
        if let Some(existing) = self.offers.get(&open_offer.offer.id) {
            return Err(TradeError::AvailabilityConflict { offer_id: open_offer.offer.id.to_string(), state: existing.state.to_string() });
        }
        info!("open offer added offer_id={} direction={:?}", open_offer.offer.id, open_offer.offer.direction);
        self.offers.insert(open_offer.offer.id.clone(), open_offer);
        Ok(())
    }

    pub fn get(&self, offer_id: &TradeId) -> Option<&OpenOffer> {
        self.offers.get(offer_id)
    }

    /// Moves an Available offer to Reserved. Any other state is a conflict.
    pub fn reserve(&mut self, offer_id: &TradeId) -> Result<&OpenOffer, TradeError> {
        let open_offer = self
            .offers
            .get_mut(offer_id)
            .ok_or_else(|| TradeError::OfferUnavailable { offer_id: offer_id.to_string(), reason: "unknown offer".to_string() })?;
        if !open_offer.is_available() {
            return Err(TradeError::AvailabilityConflict { offer_id: offer_id.to_string(), state: open_offer.state.to_string() });
        }
        open_offer.state = OfferState::Reserved;
        info!("open offer reserved offer_id={}", offer_id);
        Ok(open_offer)
    }

    pub fn close(&mut self, offer_id: &TradeId) {
        if let Some(open_offer) = self.offers.get_mut(offer_id) {
            open_offer.state = OfferState::Closed;
            info!("open offer closed offer_id={}", offer_id);
        }
    }

    /// Ids of offers still waiting for a taker.
    pub fn available_ids(&self) -> BTreeSet<TradeId> {
        self.offers.values().filter(|open_offer| open_offer.is_available()).map(|open_offer| open_offer.offer.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }
}
