use crate::application::trade_manager::TradeManager;
use crate::domain::{Capability, ParkedMessage, Position, ProtocolPayload, RegistryKind, Trade, TradeFees, TradeRole};
use crate::foundation::constants::MAX_TRADE_ID_LENGTH;
use crate::foundation::{now_nanos, MessageUid, PeerAddress, TradeError, TradeId};
use crate::infrastructure::transport::{
    AckMessage, AckSourceType, InboundMessage, MailboxDelivery, MailboxEntry, PeerMessage, PeerPublishedDelayedPayoutTxMessage,
    TakeOfferRequest, TradeMessage,
};
use log::{debug, info, trace, warn};
use std::collections::{HashSet, VecDeque};

/// Remembers the most recent (trade id, message uid) pairs so each message is
/// processed at most once. Oldest entries are evicted past `capacity`.
#[derive(Debug)]
pub struct MessageDeduplicator {
    capacity: usize,
    seen: HashSet<(TradeId, MessageUid)>,
    order: VecDeque<(TradeId, MessageUid)>,
}

impl MessageDeduplicator {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), seen: HashSet::new(), order: VecDeque::new() }
    }

    /// Returns true the first time a pair is seen.
    pub fn check_and_insert(&mut self, trade_id: &TradeId, uid: &MessageUid) -> bool {
        let key = (trade_id.clone(), uid.clone());
        if self.seen.contains(&key) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);
        true
    }

    pub fn contains(&self, trade_id: &TradeId, uid: &MessageUid) -> bool {
        self.seen.contains(&(trade_id.clone(), uid.clone()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

pub fn validate_take_offer_request(request: &TakeOfferRequest) -> Result<(), TradeError> {
    let trade_id = request.trade_id.as_str();
    if trade_id.trim().is_empty() {
        return Err(TradeError::Validation("take offer request has empty trade id".to_string()));
    }
    if trade_id.len() > MAX_TRADE_ID_LENGTH {
        return Err(TradeError::Validation(format!("trade id too long len={} max={}", trade_id.len(), MAX_TRADE_ID_LENGTH)));
    }
    if request.sender_address.trim().is_empty() {
        return Err(TradeError::Validation(format!("take offer request for {} has no sender address", request.trade_id)));
    }
    Ok(())
}

impl TradeManager {
    /// Entry point for everything the transport delivers.
    pub async fn on_inbound_message(&mut self, inbound: InboundMessage) -> Result<(), TradeError> {
        let mailbox_entry = inbound.mailbox_entry();
        debug!(
            "inbound message kind={} trade_id={} sender={} delivery={:?}",
            inbound.message.kind(),
            inbound.message.trade_id(),
            inbound.sender_address,
            inbound.delivery
        );
        match inbound.message {
            PeerMessage::TakeOfferRequest(request) => self.on_take_offer_request(request).await,
            PeerMessage::Trade(message) => self.on_trade_message(message, mailbox_entry).await,
            PeerMessage::Ack(ack) => self.on_ack_message(ack, mailbox_entry).await,
            PeerMessage::PeerPublishedDelayedPayoutTx(notice) => self.on_peer_published_delayed_payout(notice, mailbox_entry).await,
        }
    }

    /// Maker side. Anything that no longer matches an available offer is dropped silently.
    async fn on_take_offer_request(&mut self, request: TakeOfferRequest) -> Result<(), TradeError> {
        if self.dedup.contains(&request.trade_id, &request.uid) {
            debug!("duplicate take offer request ignored trade_id={} uid={}", request.trade_id, request.uid);
            return Ok(());
        }
        if let Err(err) = validate_take_offer_request(&request) {
            warn!("invalid take offer request dropped sender={} error={}", request.sender_address, err);
            return Ok(());
        }
        let Some(open_offer) = self.offers.get(&request.trade_id) else {
            debug!("take offer request for unknown offer dropped trade_id={}", request.trade_id);
            return Ok(());
        };
        if !open_offer.is_available() {
            debug!("take offer request for unavailable offer dropped trade_id={} state={}", request.trade_id, open_offer.state);
            return Ok(());
        }
        if self.was_offer_already_used_in_trade(&request.trade_id) {
            debug!("take offer request for offer already in a trade dropped trade_id={}", request.trade_id);
            return Ok(());
        }

        let offer = open_offer.offer.clone();
        let arbitrator_address = open_offer.arbitrator_address.clone();
        let mediator_address = open_offer.mediator_address.clone();
        let role = TradeRole::for_offer(offer.is_buy_offer(), Position::Maker);
        if !role.can(Capability::HandleIncomingTakeRequest) {
            return Err(TradeError::Validation(format!("role {} cannot handle take offer requests", role)));
        }

        let addresses = self.funds.reserve_trade_addresses(&offer.id).await?;
        self.offers.reserve(&offer.id)?;

        let fees = TradeFees {
            tx_fee_sat: request.tx_fee_sat,
            taker_fee_sat: request.taker_fee_sat,
            is_currency_for_taker_fee_btc: request.is_currency_for_taker_fee_btc,
        };
        let mut trade = Trade::new(&offer, role, request.sender_address.clone(), fees, now_nanos());
        trade.arbitrator_address = arbitrator_address;
        trade.mediator_address = mediator_address;
        trade.process_model.take_offer_uid = Some(request.uid.clone());
        trade.process_model.my_multisig_address = Some(addresses.multisig.address);
        trade.process_model.my_payout_address = Some(addresses.payout.address);
        trade.initialized = true;

        let trade_id = trade.id.clone();
        self.registry.add(trade.clone())?;
        // Recorded after commit; a redelivery following a failure is served again.
        self.dedup.check_and_insert(&trade_id, &request.uid);
        self.notify_added(&trade);
        self.persist(&[RegistryKind::Pending])?;
        info!("take offer request accepted trade_id={} role={} taker={}", trade_id, role, request.sender_address);

        if let Err(err) = self.handle_take_offer_request(&trade_id).await {
            self.observer.on_take_offer_request_error(&trade_id, &err);
            if let Some(trade) = self.registry.pending_mut(&trade_id) {
                trade.set_error_message(err.to_string());
            }
            self.persist(&[RegistryKind::Pending])?;
        }
        Ok(())
    }

    async fn on_trade_message(&mut self, message: TradeMessage, mailbox_entry: Option<MailboxEntry>) -> Result<(), TradeError> {
        if !self.dedup.check_and_insert(&message.trade_id, &message.uid) {
            debug!("duplicate trade message ignored trade_id={} uid={}", message.trade_id, message.uid);
            if let Some(entry) = mailbox_entry {
                self.remove_mailbox_entry(&entry).await;
            }
            return Ok(());
        }

        let TradeMessage { trade_id, uid, sender_address, payload } = message;
        let Some(trade) = self.registry.pending_mut(&trade_id) else {
            debug!("trade message for unknown trade ignored trade_id={} kind={}", trade_id, payload.name());
            return Ok(());
        };
        if !trade.initialized {
            debug!("trade message parked until initialization trade_id={} kind={}", trade_id, payload.name());
            trade.process_model.inbox.push(ParkedMessage {
                uid,
                sender: sender_address,
                payload,
                from_mailbox: mailbox_entry.is_some(),
            });
            return self.persist(&[RegistryKind::Pending]);
        }

        self.process_trade_message(&trade_id, uid, &sender_address, payload, mailbox_entry).await
    }

    /// Runs the protocol step, acknowledges it to the sender and clears the
    /// mailbox copy.
    pub(crate) async fn process_trade_message(
        &mut self,
        trade_id: &TradeId,
        uid: MessageUid,
        sender: &PeerAddress,
        payload: ProtocolPayload,
        mailbox_entry: Option<MailboxEntry>,
    ) -> Result<(), TradeError> {
        let kind = payload.name();
        let result = self.apply_protocol_payload(trade_id, sender, payload).await;
        if let Err(err) = &result {
            warn!("trade message handling failed trade_id={} kind={} error={}", trade_id, kind, err);
            if let Some(trade) = self.registry.pending_mut(trade_id) {
                trade.set_error_message(err.to_string());
                self.persist(&[RegistryKind::Pending])?;
            }
        }

        let ack = AckMessage {
            uid: MessageUid::random(),
            sender_address: self.transport.local_address(),
            source_type: AckSourceType::TradeMessage,
            source_uid: uid,
            trade_id: trade_id.clone(),
            success: result.is_ok(),
            error_message: result.as_ref().err().map(|err| err.to_string()),
        };
        if let MailboxDelivery::Failed(details) = self.transport.send_mailbox(sender, PeerMessage::Ack(ack)).await {
            warn!("ack not delivered trade_id={} peer={} error={}", trade_id, sender, details);
        }
        if let Some(entry) = mailbox_entry {
            self.remove_mailbox_entry(&entry).await;
        }
        result
    }

    async fn on_ack_message(&mut self, ack: AckMessage, mailbox_entry: Option<MailboxEntry>) -> Result<(), TradeError> {
        if ack.success {
            trace!("ack received trade_id={} source_uid={} source_type={:?}", ack.trade_id, ack.source_uid, ack.source_type);
        } else {
            warn!(
                "peer reported failure trade_id={} source_uid={} error={}",
                ack.trade_id,
                ack.source_uid,
                ack.error_message.as_deref().unwrap_or("unknown")
            );
        }
        if ack.source_type == AckSourceType::TradeMessage {
            if let Some(entry) = mailbox_entry {
                self.remove_mailbox_entry(&entry).await;
            }
        }
        Ok(())
    }

    async fn on_peer_published_delayed_payout(
        &mut self,
        notice: PeerPublishedDelayedPayoutTxMessage,
        mailbox_entry: Option<MailboxEntry>,
    ) -> Result<(), TradeError> {
        let first_delivery = self.dedup.check_and_insert(&notice.trade_id, &notice.uid);
        if first_delivery {
            if let Some(trade) = self.registry.get_mut(&notice.trade_id) {
                warn!("peer published delayed payout tx trade_id={} state={}", notice.trade_id, trade.state);
                trade.delayed_payout_published = true;
                self.persist(&RegistryKind::ALL)?;
            } else {
                debug!("delayed payout notice for unknown trade ignored trade_id={}", notice.trade_id);
            }
        }
        if let Some(entry) = mailbox_entry {
            self.remove_mailbox_entry(&entry).await;
        }
        Ok(())
    }

    async fn remove_mailbox_entry(&self, entry: &MailboxEntry) {
        if let Err(err) = self.transport.remove_from_mailbox(entry).await {
            warn!("mailbox entry removal failed uid={} sender={} error={}", entry.uid, entry.sender_address, err);
        }
    }
}
