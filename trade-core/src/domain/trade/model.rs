use crate::domain::offer::Offer;
use crate::domain::trade::payload::ProtocolPayload;
use crate::domain::trade::period::{self, TradePeriodState};
use crate::domain::trade::role::TradeRole;
use crate::domain::trade::state_machine::{ensure_valid_transition, TradeState};
use crate::domain::transaction::SignedTransaction;
use crate::foundation::{MessageUid, PeerAddress, TradeError, TradeId, TxId, WalletAddress};
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputeState {
    #[default]
    NoDispute,
    MediationRequested,
    MediationClosed,
    ArbitrationRequested,
    ArbitrationClosed,
}

impl DisputeState {
    pub fn is_closed(&self) -> bool {
        matches!(self, DisputeState::MediationClosed | DisputeState::ArbitrationClosed)
    }
}

/// Protocol message received before its trade was initialized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkedMessage {
    pub uid: MessageUid,
    pub sender: PeerAddress,
    pub payload: ProtocolPayload,
    pub from_mailbox: bool,
}

/// In-flight negotiation data.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessModel {
    pub take_offer_uid: Option<MessageUid>,
    pub my_multisig_address: Option<WalletAddress>,
    pub my_payout_address: Option<WalletAddress>,
    pub peer_multisig_address: Option<WalletAddress>,
    pub peer_payout_address: Option<WalletAddress>,
    pub delayed_payout_tx: Option<SignedTransaction>,
    pub payment_reference: Option<String>,
    pub inbox: Vec<ParkedMessage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeFees {
    pub tx_fee_sat: u64,
    pub taker_fee_sat: u64,
    pub is_currency_for_taker_fee_btc: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub role: TradeRole,
    pub state: TradeState,
    pub last_verified_state: TradeState,
    pub dispute_state: DisputeState,
    pub period_state: TradePeriodState,
    pub amount_sat: u64,
    pub price: u64,
    pub fees: TradeFees,
    pub buyer_security_deposit_sat: u64,
    pub seller_security_deposit_sat: u64,
    pub peer_address: PeerAddress,
    pub arbitrator_address: Option<PeerAddress>,
    pub mediator_address: Option<PeerAddress>,
    pub deposit_tx_id: Option<TxId>,
    pub payout_tx_id: Option<TxId>,
    pub delayed_payout_tx_id: Option<TxId>,
    pub delayed_payout_published: bool,
    pub half_deadline_nanos: Option<u64>,
    pub max_deadline_nanos: Option<u64>,
    pub created_at_nanos: u64,
    pub error_message: Option<String>,
    pub process_model: ProcessModel,
    /// Runtime only; persisted trades are re-initialized after load.
    #[serde(skip)]
    pub initialized: bool,
}

impl Trade {
    pub fn new(offer: &Offer, role: TradeRole, peer_address: PeerAddress, fees: TradeFees, created_at_nanos: u64) -> Self {
        Self {
            id: offer.id.clone(),
            role,
            state: TradeState::Preparation,
            last_verified_state: TradeState::Preparation,
            dispute_state: DisputeState::NoDispute,
            period_state: TradePeriodState::Normal,
            amount_sat: offer.amount_sat,
            price: offer.price,
            fees,
            buyer_security_deposit_sat: offer.buyer_security_deposit_sat,
            seller_security_deposit_sat: offer.seller_security_deposit_sat,
            peer_address,
            arbitrator_address: None,
            mediator_address: None,
            deposit_tx_id: None,
            payout_tx_id: None,
            delayed_payout_tx_id: None,
            delayed_payout_published: false,
            half_deadline_nanos: None,
            max_deadline_nanos: None,
            created_at_nanos,
            error_message: None,
            process_model: ProcessModel::default(),
            initialized: false,
        }
    }

    pub fn set_state(&mut self, next: TradeState) -> Result<(), TradeError> {
        let from = self.state;
        if let Err(err) = ensure_valid_transition(from, next) {
            warn!("invalid trade state transition trade_id={} from_state={} to_state={} error={}", self.id, from, next, err);
            return Err(err);
        }
        self.state = next;
        if next.is_wallet_verified() {
            self.last_verified_state = next;
        }
        if from != next {
            info!("trade state transition trade_id={} role={} from_state={} to_state={}", self.id, self.role, from, next);
        }
        Ok(())
    }

    pub fn has_failed(&self) -> bool {
        self.error_message.is_some()
    }

    pub fn set_error_message(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("trade error trade_id={} state={} error={}", self.id, self.state, message);
        self.error_message = Some(message);
    }

    /// Rewinds to the last wallet-verified state and clears the error.
    pub fn unfail(&mut self) {
        if self.state != self.last_verified_state {
            info!(
                "trade state reset on recovery trade_id={} from_state={} to_state={}",
                self.id, self.state, self.last_verified_state
            );
        }
        self.state = self.last_verified_state;
        self.error_message = None;
        self.initialized = false;
    }

    pub fn is_deposit_published(&self) -> bool {
        self.state.is_deposit_published()
    }

    pub fn is_payout_published(&self) -> bool {
        self.state.is_payout_published()
    }

    /// Escrowed funds not yet released by a payout, the delayed payout or a
    /// closed dispute.
    pub fn has_locked_funds(&self) -> bool {
        (self.deposit_tx_id.is_some() || self.is_deposit_published())
            && !self.is_payout_published()
            && !self.delayed_payout_published
            && !self.dispute_state.is_closed()
    }

    pub fn start_trade_period(&mut self, start_nanos: u64, max_period_nanos: u64) {
        let (half, max) = period::deadlines(start_nanos, max_period_nanos);
        self.half_deadline_nanos = Some(half);
        self.max_deadline_nanos = Some(max);
    }

    /// Advances the period ratchet. Returns the new state when it changed.
    pub fn update_period_state(&mut self, now_nanos: u64) -> Option<TradePeriodState> {
        if self.is_payout_published() {
            return None;
        }
        let (Some(half), Some(max)) = (self.half_deadline_nanos, self.max_deadline_nanos) else {
            return None;
        };
        let next = period::advance(self.period_state, now_nanos, half, max);
        if next == self.period_state {
            return None;
        }
        info!("trade period state changed trade_id={} from={:?} to={:?}", self.id, self.period_state, next);
        self.period_state = next;
        Some(next)
    }
}
