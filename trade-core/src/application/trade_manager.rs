use crate::application::funds::FundCoordinator;
use crate::application::lifecycle::TradeLifecycleObserver;
use crate::application::router::MessageDeduplicator;
use crate::domain::trade::state_machine::{is_terminal, validate_transition};
use crate::domain::{
    AddressContext, Capability, DisputeState, Offer, OpenOffer, OpenOfferBook, Position, RegistryKind, Trade, TradeFees,
    TradeRegistry, TradeRole, TradeState, TxConfidence,
};
use crate::foundation::util::time::secs_to_nanos;
use crate::foundation::{now_nanos, MessageUid, TradeError, TradeId, TxId, WalletAddress};
use crate::infrastructure::config::TradeConfig;
use crate::infrastructure::storage::TradeStore;
use crate::infrastructure::transport::{
    MailboxDelivery, MailboxEntry, OfferAvailability, PeerMessage, PeerPublishedDelayedPayoutTxMessage, TakeOfferRequest,
    TradeTransport,
};
use crate::infrastructure::wallet::WalletService;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::sync::Arc;

/// What the taker supplies when taking an offer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TakeOfferParams {
    pub offer: Offer,
    pub tx_fee_sat: u64,
    pub taker_fee_sat: u64,
    pub is_currency_for_taker_fee_btc: bool,
}

/// Owns the trade registries and drives every trade through its lifecycle.
///
/// All mutation happens through `&mut self`; the value is meant to be owned by
/// a single task (see `run_trade_loop`).
pub struct TradeManager {
    pub(crate) registry: TradeRegistry,
    pub(crate) offers: OpenOfferBook,
    pub(crate) funds: FundCoordinator,
    pub(crate) wallet: Arc<dyn WalletService>,
    pub(crate) transport: Arc<dyn TradeTransport>,
    store: Arc<dyn TradeStore>,
    pub(crate) observer: Arc<dyn TradeLifecycleObserver>,
    pub(crate) config: TradeConfig,
    pub(crate) dedup: MessageDeduplicator,
    services_initialized: bool,
    pending_initialized: bool,
}

impl TradeManager {
    pub fn new(
        config: TradeConfig,
        wallet: Arc<dyn WalletService>,
        transport: Arc<dyn TradeTransport>,
        store: Arc<dyn TradeStore>,
        observer: Arc<dyn TradeLifecycleObserver>,
    ) -> Self {
        Self {
            registry: TradeRegistry::new(),
            offers: OpenOfferBook::new(),
            funds: FundCoordinator::new(wallet.clone()),
            dedup: MessageDeduplicator::new(config.dedup_capacity),
            wallet,
            transport,
            store,
            observer,
            config,
            services_initialized: false,
            pending_initialized: false,
        }
    }

    pub fn config(&self) -> &TradeConfig {
        &self.config
    }

    pub fn registry(&self) -> &TradeRegistry {
        &self.registry
    }

    pub fn offers(&self) -> &OpenOfferBook {
        &self.offers
    }

    pub fn transport(&self) -> Arc<dyn TradeTransport> {
        self.transport.clone()
    }

    /// Loads the three collections from the store.
    pub fn read_persisted(&mut self) -> Result<(), TradeError> {
        for kind in RegistryKind::ALL {
            let trades = self.store.load(kind)?;
            self.registry.load(kind, trades)?;
        }
        info!(
            "persisted trades loaded pending={} closed={} failed={}",
            self.registry.len(RegistryKind::Pending),
            self.registry.len(RegistryKind::Closed),
            self.registry.len(RegistryKind::Failed)
        );
        self.observer.on_pending_count_changed(self.registry.pending_count());
        Ok(())
    }

    /// Pending trades are initialized now if the network is up, otherwise on bootstrap.
    pub async fn on_all_services_initialized(&mut self) -> Result<(), TradeError> {
        self.services_initialized = true;
        if self.transport.is_bootstrapped() {
            self.init_pending_trades().await
        } else {
            info!("waiting for network bootstrap before initializing pending trades pending_count={}", self.registry.pending_count());
            Ok(())
        }
    }

    pub async fn on_bootstrapped(&mut self) -> Result<(), TradeError> {
        if !self.services_initialized {
            debug!("network bootstrapped before services were initialized");
            return Ok(());
        }
        self.init_pending_trades().await
    }

    async fn init_pending_trades(&mut self) -> Result<(), TradeError> {
        if !self.pending_initialized {
            let keep = self.offers.available_ids();
            let swept = self.funds.sweep_offer_funding(&keep).await?;
            if swept > 0 {
                info!("offer funding entries returned to pool count={}", swept);
            }
            self.pending_initialized = true;
        }
        self.initialize_waiting_trades().await;
        self.update_trade_period_states(now_nanos())
    }

    /// Initializes every pending trade not yet initialized. A trade that fails
    /// stays uninitialized and is retried on the next call. Returns the number
    /// of failures.
    pub async fn initialize_waiting_trades(&mut self) -> usize {
        if !self.pending_initialized {
            return 0;
        }
        let waiting: Vec<TradeId> =
            self.registry.trades(RegistryKind::Pending).filter(|trade| !trade.initialized).map(|trade| trade.id.clone()).collect();
        if waiting.is_empty() {
            return 0;
        }
        let mut failed = 0;
        for trade_id in &waiting {
            if let Err(err) = self.initialize_trade(trade_id).await {
                warn!("pending trade initialization failed, will retry trade_id={} error={}", trade_id, err);
                failed += 1;
            }
        }
        info!("pending trades initialized count={} failed={}", waiting.len() - failed, failed);
        failed
    }

    /// Refreshes the deposit from the wallet, marks the trade initialized and
    /// processes anything parked in its inbox.
    pub(crate) async fn initialize_trade(&mut self, trade_id: &TradeId) -> Result<(), TradeError> {
        let mut trade = self.pending_trade(trade_id)?;
        if trade.state == TradeState::DepositPublished {
            if let Some(deposit_tx_id) = trade.deposit_tx_id {
                let confidence = self.wallet.confidence(&deposit_tx_id).await?;
                debug!("deposit refreshed trade_id={} deposit_tx_id={} confidence={:?}", trade_id, deposit_tx_id, confidence);
                if confidence.is_building() {
                    trade.set_state(TradeState::DepositConfirmed)?;
                }
            }
        }
        trade.initialized = true;
        let inbox = std::mem::take(&mut trade.process_model.inbox);
        self.replace_trade(trade)?;
        self.persist(&[RegistryKind::Pending])?;

        if !inbox.is_empty() {
            debug!("draining parked messages trade_id={} count={}", trade_id, inbox.len());
        }
        for parked in inbox {
            let mailbox_entry = parked.from_mailbox.then(|| MailboxEntry { uid: parked.uid.clone(), sender_address: parked.sender.clone() });
            if let Err(err) = self.process_trade_message(trade_id, parked.uid, &parked.sender, parked.payload, mailbox_entry).await {
                warn!("parked message failed trade_id={} error={}", trade_id, err);
            }
        }
        Ok(())
    }

    pub fn add_open_offer(&mut self, open_offer: OpenOffer) -> Result<(), TradeError> {
        self.offers.add(open_offer)
    }

    async fn ensure_tx_backlog_below_limit(&self) -> Result<(), TradeError> {
        let unconfirmed = self.wallet.unconfirmed_tx_count().await?;
        let limit = self.config.max_unconfirmed_txs;
        if unconfirmed > limit {
            warn!("unconfirmed transaction backlog too large unconfirmed={} limit={}", unconfirmed, limit);
            return Err(TradeError::ResourceLimit { unconfirmed, limit });
        }
        Ok(())
    }

    pub async fn check_offer_availability(&self, offer: &Offer) -> Result<OfferAvailability, TradeError> {
        self.ensure_tx_backlog_below_limit().await?;
        let availability = self.transport.request_offer_availability(offer).await?;
        debug!("offer availability offer_id={} availability={:?}", offer.id, availability);
        Ok(availability)
    }

    /// Taker side: handshake, reserve addresses, register and send the request.
    pub async fn take_offer(&mut self, params: TakeOfferParams) -> Result<Trade, TradeError> {
        let TakeOfferParams { offer, tx_fee_sat, taker_fee_sat, is_currency_for_taker_fee_btc } = params;
        self.ensure_tx_backlog_below_limit().await?;
        if self.was_offer_already_used_in_trade(&offer.id) {
            return Err(TradeError::OfferAlreadyUsed(offer.id.to_string()));
        }
        if let OfferAvailability::Unavailable(reason) = self.transport.request_offer_availability(&offer).await? {
            return Err(TradeError::OfferUnavailable { offer_id: offer.id.to_string(), reason });
        }

        let role = TradeRole::for_offer(offer.is_buy_offer(), Position::Taker);
        if !role.can(Capability::InitiateTake) {
            return Err(TradeError::Validation(format!("role {} cannot take offers", role)));
        }

        let addresses = self.funds.reserve_trade_addresses(&offer.id).await?;
        let fees = TradeFees { tx_fee_sat, taker_fee_sat, is_currency_for_taker_fee_btc };
        let mut trade = Trade::new(&offer, role, offer.maker_address.clone(), fees.clone(), now_nanos());
        let uid = MessageUid::random();
        trade.process_model.my_multisig_address = Some(addresses.multisig.address);
        trade.process_model.my_payout_address = Some(addresses.payout.address);
        trade.process_model.take_offer_uid = Some(uid.clone());
        trade.initialized = true;

        let trade_id = trade.id.clone();
        let peer = trade.peer_address.clone();
        self.registry.add(trade.clone())?;
        self.notify_added(&trade);

        let request = TakeOfferRequest {
            trade_id: trade_id.clone(),
            uid,
            sender_address: self.transport.local_address(),
            tx_fee_sat: fees.tx_fee_sat,
            taker_fee_sat: fees.taker_fee_sat,
            is_currency_for_taker_fee_btc: fees.is_currency_for_taker_fee_btc,
        };
        if let Err(err) = self.transport.send_direct(&peer, PeerMessage::TakeOfferRequest(request)).await {
            warn!("take offer request not sent, reverting trade trade_id={} peer={} error={}", trade_id, peer, err);
            self.registry.remove(&trade_id)?;
            self.notify_removed(&trade_id, None);
            for context in AddressContext::TRADE {
                self.funds.release(&trade_id, context).await?;
            }
            self.persist(&[RegistryKind::Pending])?;
            return Err(err);
        }

        trade.set_state(TradeState::TakeOfferRequestSent)?;
        self.replace_trade(trade.clone())?;
        self.persist(&[RegistryKind::Pending])?;
        info!("offer taken trade_id={} role={} peer={} amount_sat={}", trade_id, role, peer, trade.amount_sat);
        Ok(trade)
    }

    pub async fn request_withdraw(
        &mut self,
        trade_id: &TradeId,
        destination: &WalletAddress,
        amount_sat: u64,
        fee_sat: u64,
    ) -> Result<TxId, TradeError> {
        if !self.registry.contains(trade_id) {
            return Err(TradeError::TradeNotFound(trade_id.to_string()));
        }
        let tx_id = self.funds.withdraw(trade_id, destination, amount_sat, fee_sat).await?;
        self.complete_trade(trade_id, Some(TradeState::WithdrawCompleted)).await?;
        Ok(tx_id)
    }

    pub async fn close_disputed_trade(&mut self, trade_id: &TradeId, dispute_state: DisputeState) -> Result<(), TradeError> {
        let trade = self.registry.get_mut(trade_id).ok_or_else(|| TradeError::TradeNotFound(trade_id.to_string()))?;
        info!("closing disputed trade trade_id={} dispute_state={:?}", trade_id, dispute_state);
        trade.dispute_state = dispute_state;
        self.complete_trade(trade_id, None).await
    }

    /// Relocates to Closed and releases every address the trade held. Safe to
    /// repeat on an already-closed trade.
    async fn complete_trade(&mut self, trade_id: &TradeId, final_state: Option<TradeState>) -> Result<(), TradeError> {
        let trade = self.registry.get_mut(trade_id).ok_or_else(|| TradeError::TradeNotFound(trade_id.to_string()))?;
        if let Some(state) = final_state {
            if validate_transition(trade.state, state) {
                trade.set_state(state)?;
            } else {
                debug!("final state skipped trade_id={} state={} final_state={}", trade_id, trade.state, state);
            }
        }
        let terminal = is_terminal(trade.state);

        let source = self.registry.move_to_closed(trade_id)?;
        if source == Some(RegistryKind::Pending) {
            self.notify_removed(trade_id, Some(RegistryKind::Closed));
        }
        self.funds.reset_for_trade(trade_id).await?;
        self.offers.close(trade_id);
        self.persist(&RegistryKind::ALL)?;
        info!("trade completed trade_id={} from={:?} terminal={}", trade_id, source, terminal);
        Ok(())
    }

    /// Broadcasts the pre-signed fallback payout and tells the counterparty.
    pub async fn publish_delayed_payout(&mut self, trade_id: &TradeId) -> Result<(), TradeError> {
        let trade = self.registry.get(trade_id).cloned().ok_or_else(|| TradeError::TradeNotFound(trade_id.to_string()))?;
        let delayed_payout_tx =
            trade.process_model.delayed_payout_tx.clone().ok_or_else(|| TradeError::MissingDelayedPayoutTx(trade_id.to_string()))?;

        let tx_id = self.wallet.broadcast(&delayed_payout_tx).await?;
        self.funds.release(trade_id, AddressContext::MultiSig).await?;
        if let Some(stored) = self.registry.get_mut(trade_id) {
            stored.delayed_payout_published = true;
            stored.delayed_payout_tx_id = Some(tx_id);
        }
        self.persist(&RegistryKind::ALL)?;
        info!("delayed payout published trade_id={} tx_id={}", trade_id, tx_id);

        let notice = PeerPublishedDelayedPayoutTxMessage {
            uid: MessageUid::random(),
            trade_id: trade_id.clone(),
            recipient_address: trade.peer_address.clone(),
        };
        match self.transport.send_mailbox(&trade.peer_address, PeerMessage::PeerPublishedDelayedPayoutTx(notice)).await {
            MailboxDelivery::Delivered => {
                debug!("delayed payout notice delivered trade_id={} peer={}", trade_id, trade.peer_address);
                Ok(())
            }
            MailboxDelivery::Queued => {
                debug!("delayed payout notice queued in mailbox trade_id={} peer={}", trade_id, trade.peer_address);
                Ok(())
            }
            MailboxDelivery::Failed(details) => Err(TradeError::MailboxDeliveryFailed { trade_id: trade_id.to_string(), details }),
        }
    }

    /// Re-derives both trade addresses and moves the trade back to Pending.
    /// Returns false, with nothing changed, when either address is gone.
    pub async fn recover_failed_trade(&mut self, trade_id: &TradeId) -> Result<bool, TradeError> {
        match self.registry.kind_of(trade_id) {
            None => return Err(TradeError::TradeNotFound(trade_id.to_string())),
            Some(RegistryKind::Failed) => {}
            Some(kind) => {
                warn!("recover requested for trade that is not failed trade_id={} registry={}", trade_id, kind);
                return Ok(false);
            }
        }
        let Some(addresses) = self.funds.recover_trade_addresses(trade_id).await? else {
            warn!("failed trade not recovered, addresses unavailable trade_id={}", trade_id);
            return Ok(false);
        };

        if let Some(trade) = self.registry.get_mut(trade_id) {
            trade.unfail();
            trade.process_model.my_multisig_address = Some(addresses.multisig.address);
            trade.process_model.my_payout_address = Some(addresses.payout.address);
        }
        self.add_failed_trade_to_pending(trade_id).await?;
        info!("failed trade recovered trade_id={}", trade_id);
        Ok(true)
    }

    async fn add_failed_trade_to_pending(&mut self, trade_id: &TradeId) -> Result<(), TradeError> {
        self.registry.move_failed_to_pending(trade_id)?;
        if let Some(trade) = self.registry.get(trade_id) {
            self.observer.on_trade_added(trade);
        }
        self.observer.on_pending_count_changed(self.registry.pending_count());
        self.persist(&[RegistryKind::Pending, RegistryKind::Failed])?;

        // Before bootstrap the trade is picked up by init_pending_trades.
        if self.pending_initialized {
            self.initialize_trade(trade_id).await?;
        }
        Ok(())
    }

    pub fn move_to_failed(&mut self, trade_id: &TradeId, reason: &str) -> Result<(), TradeError> {
        if let Some(trade) = self.registry.pending_mut(trade_id) {
            trade.set_error_message(reason);
        }
        if self.registry.move_to_failed(trade_id)? {
            self.notify_removed(trade_id, Some(RegistryKind::Failed));
            self.persist(&[RegistryKind::Pending, RegistryKind::Failed])?;
        }
        Ok(())
    }

    pub fn update_trade_period_states(&mut self, now_nanos: u64) -> Result<(), TradeError> {
        let mut changed = Vec::new();
        for trade_id in self.registry.pending_ids() {
            if let Some(trade) = self.registry.pending_mut(&trade_id) {
                if let Some(period_state) = trade.update_period_state(now_nanos) {
                    changed.push((trade_id, period_state));
                }
            }
        }
        if changed.is_empty() {
            return Ok(());
        }
        for (trade_id, period_state) in &changed {
            self.observer.on_period_state_changed(trade_id, *period_state);
        }
        self.persist(&[RegistryKind::Pending])
    }

    pub fn trade_by_id(&self, trade_id: &TradeId) -> Option<Trade> {
        self.registry.get(trade_id).cloned()
    }

    pub fn trades_with_locked_funds(&self) -> Vec<Trade> {
        self.registry.trades(RegistryKind::Pending).filter(|trade| trade.has_locked_funds()).cloned().collect()
    }

    pub fn pending_trade_count(&self) -> usize {
        self.registry.pending_count()
    }

    pub fn was_offer_already_used_in_trade(&self, offer_id: &TradeId) -> bool {
        self.registry.contains(offer_id)
    }

    /// Trades outside normal flow that still hold escrowed funds. A closed
    /// trade whose deposit is missing or known to be unconfirmed is an error.
    pub async fn failed_or_closed_trade_ids_with_locked_funds(&self) -> Result<BTreeSet<TradeId>, TradeError> {
        let mut ids = BTreeSet::new();

        for trade in self.registry.trades(RegistryKind::Pending).filter(|trade| trade.has_failed() && trade.has_locked_funds()) {
            warn!("pending trade with error has locked funds trade_id={} state={}", trade.id, trade.state);
            ids.insert(trade.id.clone());
        }
        for trade in self.registry.trades(RegistryKind::Failed).filter(|trade| trade.has_locked_funds()) {
            warn!("failed trade has locked funds trade_id={} state={}", trade.id, trade.state);
            ids.insert(trade.id.clone());
        }

        let closed: Vec<(TradeId, Option<TxId>)> = self
            .registry
            .trades(RegistryKind::Closed)
            .filter(|trade| trade.has_locked_funds())
            .map(|trade| (trade.id.clone(), trade.deposit_tx_id))
            .collect();
        for (trade_id, deposit_tx_id) in closed {
            let Some(deposit_tx_id) = deposit_tx_id else {
                return Err(TradeError::InconsistentLockedFunds {
                    trade_id: trade_id.to_string(),
                    reason: "closed trade reports locked funds without a deposit transaction".to_string(),
                });
            };
            match self.wallet.confidence(&deposit_tx_id).await? {
                TxConfidence::Building { depth } => {
                    warn!("closed trade has locked funds trade_id={} deposit_tx_id={} depth={}", trade_id, deposit_tx_id, depth);
                    ids.insert(trade_id);
                }
                TxConfidence::Unknown => {
                    warn!("closed trade has locked funds, deposit confidence unknown trade_id={} deposit_tx_id={}", trade_id, deposit_tx_id);
                    ids.insert(trade_id);
                }
                confidence => {
                    return Err(TradeError::InconsistentLockedFunds {
                        trade_id: trade_id.to_string(),
                        reason: format!("deposit transaction {} is not confirmed confidence={:?}", deposit_tx_id, confidence),
                    });
                }
            }
        }
        Ok(ids)
    }

    pub(crate) fn pending_trade(&self, trade_id: &TradeId) -> Result<Trade, TradeError> {
        match self.registry.kind_of(trade_id) {
            Some(RegistryKind::Pending) => self.registry.get(trade_id).cloned().ok_or_else(|| TradeError::TradeNotFound(trade_id.to_string())),
            _ => Err(TradeError::TradeNotFound(trade_id.to_string())),
        }
    }

    /// Writes back a trade previously cloned out of its collection.
    pub(crate) fn replace_trade(&mut self, trade: Trade) -> Result<(), TradeError> {
        let slot = self.registry.get_mut(&trade.id).ok_or_else(|| TradeError::TradeNotFound(trade.id.to_string()))?;
        *slot = trade;
        Ok(())
    }

    pub(crate) fn persist(&self, kinds: &[RegistryKind]) -> Result<(), TradeError> {
        for kind in kinds {
            self.store.save(*kind, &self.registry.snapshot(*kind))?;
        }
        Ok(())
    }

    pub(crate) fn notify_added(&self, trade: &Trade) {
        self.observer.on_trade_added(trade);
        self.observer.on_pending_count_changed(self.registry.pending_count());
    }

    pub(crate) fn notify_removed(&self, trade_id: &TradeId, destination: Option<RegistryKind>) {
        self.observer.on_trade_removed(trade_id, destination);
        self.observer.on_pending_count_changed(self.registry.pending_count());
    }
}
