use crate::foundation::{MessageUid, PeerAddress, TradeId};
use serde::{Deserialize, Serialize};

pub use crate::domain::trade::ProtocolPayload;

/// Direct message from a taker asking the maker to open a trade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeOfferRequest {
    pub trade_id: TradeId,
    pub uid: MessageUid,
    pub sender_address: PeerAddress,
    pub tx_fee_sat: u64,
    pub taker_fee_sat: u64,
    pub is_currency_for_taker_fee_btc: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckSourceType {
    TradeMessage,
    OfferMessage,
    DisputeMessage,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckMessage {
    pub uid: MessageUid,
    pub sender_address: PeerAddress,
    pub source_type: AckSourceType,
    pub source_uid: MessageUid,
    pub trade_id: TradeId,
    pub success: bool,
    pub error_message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerPublishedDelayedPayoutTxMessage {
    pub uid: MessageUid,
    pub trade_id: TradeId,
    pub recipient_address: PeerAddress,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeMessage {
    pub trade_id: TradeId,
    pub uid: MessageUid,
    pub sender_address: PeerAddress,
    pub payload: ProtocolPayload,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerMessage {
    TakeOfferRequest(TakeOfferRequest),
    Trade(TradeMessage),
    Ack(AckMessage),
    PeerPublishedDelayedPayoutTx(PeerPublishedDelayedPayoutTxMessage),
}

impl PeerMessage {
    pub fn uid(&self) -> &MessageUid {
        match self {
            PeerMessage::TakeOfferRequest(msg) => &msg.uid,
            PeerMessage::Trade(msg) => &msg.uid,
            PeerMessage::Ack(msg) => &msg.uid,
            PeerMessage::PeerPublishedDelayedPayoutTx(msg) => &msg.uid,
        }
    }

    pub fn trade_id(&self) -> &TradeId {
        match self {
            PeerMessage::TakeOfferRequest(msg) => &msg.trade_id,
            PeerMessage::Trade(msg) => &msg.trade_id,
            PeerMessage::Ack(msg) => &msg.trade_id,
            PeerMessage::PeerPublishedDelayedPayoutTx(msg) => &msg.trade_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::TakeOfferRequest(_) => "TakeOfferRequest",
            PeerMessage::Trade(msg) => msg.payload.name(),
            PeerMessage::Ack(_) => "AckMessage",
            PeerMessage::PeerPublishedDelayedPayoutTx(_) => "PeerPublishedDelayedPayoutTxMessage",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delivery {
    Direct,
    Mailbox,
}

/// Identifies a stored mailbox entry for removal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailboxEntry {
    pub uid: MessageUid,
    pub sender_address: PeerAddress,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub delivery: Delivery,
    pub sender_address: PeerAddress,
    pub message: PeerMessage,
}

impl InboundMessage {
    pub fn mailbox_entry(&self) -> Option<MailboxEntry> {
        match self.delivery {
            Delivery::Mailbox => {
                Some(MailboxEntry { uid: self.message.uid().clone(), sender_address: self.sender_address.clone() })
            }
            Delivery::Direct => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    Message(InboundMessage),
    Bootstrapped,
}

/// Outcome of a store-and-forward send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MailboxDelivery {
    /// Peer was online and received it.
    Delivered,
    /// Stored for pickup when the peer reconnects.
    Queued,
    Failed(String),
}

impl MailboxDelivery {
    pub fn is_success(&self) -> bool {
        matches!(self, MailboxDelivery::Delivered | MailboxDelivery::Queued)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OfferAvailability {
    Available,
    Unavailable(String),
}
