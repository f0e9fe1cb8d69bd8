use super::encoding::{decode_message, encode_message};
use super::traits::{InboundSubscription, TradeTransport};
use crate::domain::Offer;
use crate::foundation::{PeerAddress, TradeError, TradeId};
use crate::infrastructure::transport::messages::{
    Delivery, InboundMessage, MailboxDelivery, MailboxEntry, OfferAvailability, PeerMessage, TransportEvent,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

// What travels between peers: encoded frames, as on a real wire.
#[derive(Clone, Debug)]
enum HubEvent {
    Frame { delivery: Delivery, sender_address: PeerAddress, bytes: Vec<u8> },
    Bootstrapped,
}

/// In-process routing between mock transports, keyed by peer address.
pub struct MockHub {
    peers: Mutex<HashMap<PeerAddress, broadcast::Sender<HubEvent>>>,
}

impl MockHub {
    pub fn new() -> Self {
        Self { peers: Mutex::new(HashMap::new()) }
    }

    async fn channel(&self, peer: &PeerAddress) -> broadcast::Sender<HubEvent> {
        let mut guard = self.peers.lock().await;
        guard.entry(peer.clone()).or_insert_with(|| broadcast::channel(256).0).clone()
    }

    /// Encodes and delivers `inbound` to `peer`. Returns false when nobody is subscribed.
    async fn route(&self, peer: &PeerAddress, inbound: &InboundMessage) -> Result<bool, TradeError> {
        let bytes = encode_message(&inbound.message)?;
        let sender = self.channel(peer).await;
        let frame = HubEvent::Frame { delivery: inbound.delivery, sender_address: inbound.sender_address.clone(), bytes };
        Ok(sender.send(frame).is_ok())
    }
}

impl Default for MockHub {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub peer: PeerAddress,
    pub delivery: Delivery,
    pub message: PeerMessage,
}

pub struct MockTransport {
    hub: Arc<MockHub>,
    local_address: PeerAddress,
    bootstrapped: AtomicBool,
    fail_direct: AtomicBool,
    sent: Mutex<Vec<SentMessage>>,
    removed: Mutex<Vec<MailboxEntry>>,
    availability: Mutex<HashMap<TradeId, OfferAvailability>>,
    mailbox_outcome: Mutex<Option<MailboxDelivery>>,
}

impl MockTransport {
    pub fn new(hub: Arc<MockHub>, local_address: PeerAddress) -> Self {
        Self {
            hub,
            local_address,
            bootstrapped: AtomicBool::new(true),
            fail_direct: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            availability: Mutex::new(HashMap::new()),
            mailbox_outcome: Mutex::new(None),
        }
    }

    pub fn standalone(local_address: impl Into<PeerAddress>) -> Self {
        Self::new(Arc::new(MockHub::new()), local_address.into())
    }

    pub fn set_bootstrapped(&self, bootstrapped: bool) {
        self.bootstrapped.store(bootstrapped, Ordering::SeqCst);
    }

    pub fn set_fail_direct(&self, fail: bool) {
        self.fail_direct.store(fail, Ordering::SeqCst);
    }

    pub async fn set_offer_availability(&self, offer_id: impl Into<TradeId>, availability: OfferAvailability) {
        self.availability.lock().await.insert(offer_id.into(), availability);
    }

    /// Forces every mailbox send to report `outcome`. `None` routes normally.
    pub async fn set_mailbox_outcome(&self, outcome: Option<MailboxDelivery>) {
        *self.mailbox_outcome.lock().await = outcome;
    }

    /// Pushes an event into this transport's own inbound stream.
    pub async fn inject(&self, event: TransportEvent) {
        match event {
            TransportEvent::Message(inbound) => {
                let _ = self.hub.route(&self.local_address, &inbound).await;
            }
            TransportEvent::Bootstrapped => {
                let _ = self.hub.channel(&self.local_address).await.send(HubEvent::Bootstrapped);
            }
        }
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn removed_mailbox_entries(&self) -> Vec<MailboxEntry> {
        self.removed.lock().await.clone()
    }

    async fn record(&self, peer: &PeerAddress, delivery: Delivery, message: &PeerMessage) {
        self.sent.lock().await.push(SentMessage { peer: peer.clone(), delivery, message: message.clone() });
    }
}

#[async_trait]
impl TradeTransport for MockTransport {
    fn local_address(&self) -> PeerAddress {
        self.local_address.clone()
    }

    async fn send_direct(&self, peer: &PeerAddress, message: PeerMessage) -> Result<(), TradeError> {
        if self.fail_direct.load(Ordering::SeqCst) {
            return Err(TradeError::TransportError { operation: "send_direct".to_string(), details: format!("peer {} unreachable", peer) });
        }
        self.record(peer, Delivery::Direct, &message).await;
        let inbound = InboundMessage { delivery: Delivery::Direct, sender_address: self.local_address.clone(), message };
        // A direct send to an offline peer is dropped on the floor.
        self.hub.route(peer, &inbound).await?;
        Ok(())
    }

    async fn send_mailbox(&self, peer: &PeerAddress, message: PeerMessage) -> MailboxDelivery {
        self.record(peer, Delivery::Mailbox, &message).await;
        if let Some(outcome) = self.mailbox_outcome.lock().await.clone() {
            return outcome;
        }
        let inbound = InboundMessage { delivery: Delivery::Mailbox, sender_address: self.local_address.clone(), message };
        match self.hub.route(peer, &inbound).await {
            Ok(true) => MailboxDelivery::Delivered,
            Ok(false) => MailboxDelivery::Queued,
            Err(err) => MailboxDelivery::Failed(err.to_string()),
        }
    }

    async fn remove_from_mailbox(&self, entry: &MailboxEntry) -> Result<(), TradeError> {
        self.removed.lock().await.push(entry.clone());
        Ok(())
    }

    async fn request_offer_availability(&self, offer: &Offer) -> Result<OfferAvailability, TradeError> {
        Ok(self.availability.lock().await.get(&offer.id).cloned().unwrap_or(OfferAvailability::Available))
    }

    fn is_bootstrapped(&self) -> bool {
        self.bootstrapped.load(Ordering::SeqCst)
    }

    async fn subscribe(&self) -> Result<InboundSubscription, TradeError> {
        let sender = self.hub.channel(&self.local_address).await;
        let mut receiver = sender.subscribe();
        let stream = async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(HubEvent::Frame { delivery, sender_address, bytes }) => match decode_message(&bytes) {
                        Ok(message) => yield Ok(TransportEvent::Message(InboundMessage { delivery, sender_address, message })),
                        Err(err) => yield Err(err),
                    },
                    Ok(HubEvent::Bootstrapped) => yield Ok(TransportEvent::Bootstrapped),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        yield Err(TradeError::TransportError { operation: "mock_inbound".to_string(), details: "lagged".to_string() });
                    }
                }
            }
        };
        Ok(InboundSubscription::new(Box::pin(stream)))
    }
}
