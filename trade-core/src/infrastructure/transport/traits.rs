use crate::domain::Offer;
use crate::foundation::{PeerAddress, TradeError};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;

pub use crate::infrastructure::transport::messages::{
    InboundMessage, MailboxDelivery, MailboxEntry, OfferAvailability, PeerMessage, TransportEvent,
};

pub type Result<T> = std::result::Result<T, TradeError>;

pub struct InboundSubscription {
    inner: BoxStream<'static, Result<TransportEvent>>,
}

impl InboundSubscription {
    pub fn new(inner: BoxStream<'static, Result<TransportEvent>>) -> Self {
        Self { inner }
    }

    pub async fn next(&mut self) -> Option<Result<TransportEvent>> {
        self.inner.next().await
    }
}

#[async_trait]
pub trait TradeTransport: Send + Sync {
    fn local_address(&self) -> PeerAddress;
    async fn send_direct(&self, peer: &PeerAddress, message: PeerMessage) -> Result<()>;
    async fn send_mailbox(&self, peer: &PeerAddress, message: PeerMessage) -> MailboxDelivery;
    async fn remove_from_mailbox(&self, entry: &MailboxEntry) -> Result<()>;
    /// Asks the maker whether the offer can still be taken.
    async fn request_offer_availability(&self, offer: &Offer) -> Result<OfferAvailability>;
    fn is_bootstrapped(&self) -> bool;
    async fn subscribe(&self) -> Result<InboundSubscription>;
}
