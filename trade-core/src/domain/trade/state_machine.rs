use crate::foundation::TradeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol phase of a trade. Variants are declared in protocol order so
/// `Ord` reflects progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TradeState {
    Preparation,
    TakeOfferRequestSent,
    TakeOfferRequestReceived,
    DepositTxRequested,
    DepositPublished,
    DepositConfirmed,
    PaymentStarted,
    PaymentReceived,
    PayoutPublished,
    WithdrawCompleted,
}

const VALID_TRANSITIONS: &[(TradeState, TradeState)] = &[
    (TradeState::Preparation, TradeState::TakeOfferRequestSent),
    (TradeState::Preparation, TradeState::TakeOfferRequestReceived),
    (TradeState::TakeOfferRequestReceived, TradeState::DepositTxRequested),
    (TradeState::TakeOfferRequestSent, TradeState::DepositPublished),
    (TradeState::DepositTxRequested, TradeState::DepositPublished),
    (TradeState::DepositPublished, TradeState::DepositConfirmed),
    (TradeState::DepositPublished, TradeState::PaymentStarted),
    (TradeState::DepositConfirmed, TradeState::PaymentStarted),
    (TradeState::PaymentStarted, TradeState::PaymentReceived),
    (TradeState::PaymentStarted, TradeState::PayoutPublished),
    (TradeState::PaymentReceived, TradeState::PayoutPublished),
    (TradeState::PayoutPublished, TradeState::WithdrawCompleted),
];

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl TradeState {
    pub fn is_deposit_published(&self) -> bool {
        *self >= TradeState::DepositPublished
    }

    pub fn is_payout_published(&self) -> bool {
        *self >= TradeState::PayoutPublished
    }

    /// States that have been checked against wallet state and may serve as an
    /// unfail target.
    pub fn is_wallet_verified(&self) -> bool {
        matches!(
            self,
            TradeState::Preparation
                | TradeState::DepositPublished
                | TradeState::DepositConfirmed
                | TradeState::PayoutPublished
                | TradeState::WithdrawCompleted
        )
    }
}

pub fn validate_transition(from: TradeState, to: TradeState) -> bool {
    from == to || VALID_TRANSITIONS.contains(&(from, to))
}

pub fn ensure_valid_transition(from: TradeState, to: TradeState) -> Result<(), TradeError> {
    if validate_transition(from, to) {
        Ok(())
    } else {
        Err(TradeError::InvalidStateTransition { from: from.to_string(), to: to.to_string() })
    }
}

pub fn is_terminal(state: TradeState) -> bool {
    state == TradeState::WithdrawCompleted
}
