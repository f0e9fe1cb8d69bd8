//! Trade protocol steps for each role, from the take-offer request to the
//! cooperative payout.
//!
//! Maker                                   Taker
//!   <- TakeOfferRequest (direct) --------
//!   -- DepositTxRequest ---------------->   signs + broadcasts deposit,
//!   <- DepositTxPublished ---------------   signs delayed payout
//!
//! Buyer                                   Seller
//!   -- PaymentStarted ------------------>
//!   <- PayoutTxPublished ----------------   signs + broadcasts payout

use crate::application::trade_manager::TradeManager;
use crate::domain::trade::state_machine::ensure_valid_transition;
use crate::domain::{ProtocolPayload, RegistryKind, SignedTransaction, Trade, TradeState, TxKind, TxOutput, TxTemplate};
use crate::foundation::constants::DELAYED_PAYOUT_LOCK_BLOCKS;
use crate::foundation::util::time::secs_to_nanos;
use crate::foundation::{now_nanos, MessageUid, PeerAddress, TradeError, TradeId, TxId, WalletAddress};
use crate::infrastructure::transport::{MailboxDelivery, PeerMessage, TradeMessage};
use log::{debug, info, warn};

fn required_address(trade: &Trade, address: &Option<WalletAddress>, what: &str) -> Result<WalletAddress, TradeError> {
    address.clone().ok_or_else(|| TradeError::address_unavailable(trade.id.as_str(), what))
}

/// The deposit lands in the taker's escrow address.
fn escrow_address(trade: &Trade) -> Result<WalletAddress, TradeError> {
    let model = &trade.process_model;
    if trade.role.is_maker() {
        required_address(trade, &model.peer_multisig_address, "peer multisig")
    } else {
        required_address(trade, &model.my_multisig_address, "multisig")
    }
}

/// Buyer receives trade amount plus its deposit back, seller its deposit.
fn payout_outputs(trade: &Trade) -> Result<Vec<TxOutput>, TradeError> {
    let model = &trade.process_model;
    let mine = required_address(trade, &model.my_payout_address, "payout")?;
    let peer = required_address(trade, &model.peer_payout_address, "peer payout")?;
    let (buyer, seller) = if trade.role.is_buyer() { (mine, peer) } else { (peer, mine) };
    Ok(vec![
        TxOutput { address: buyer, amount_sat: trade.amount_sat.saturating_add(trade.buyer_security_deposit_sat) },
        TxOutput { address: seller, amount_sat: trade.seller_security_deposit_sat },
    ])
}

fn deposit_amount(trade: &Trade) -> u64 {
    trade.amount_sat.saturating_add(trade.buyer_security_deposit_sat).saturating_add(trade.seller_security_deposit_sat)
}

impl TradeManager {
    /// Maker's reaction to an accepted take-offer request: hand the taker the
    /// addresses it needs for the deposit.
    pub(crate) async fn handle_take_offer_request(&mut self, trade_id: &TradeId) -> Result<(), TradeError> {
        let mut trade = self.pending_trade(trade_id)?;
        trade.set_state(TradeState::TakeOfferRequestReceived)?;
        let multisig_address = required_address(&trade, &trade.process_model.my_multisig_address, "multisig")?;
        let payout_address = required_address(&trade, &trade.process_model.my_payout_address, "payout")?;
        self.replace_trade(trade.clone())?;

        self.send_trade_message(&trade, ProtocolPayload::DepositTxRequest { multisig_address, payout_address }).await?;

        trade.set_state(TradeState::DepositTxRequested)?;
        self.replace_trade(trade)?;
        self.persist(&[RegistryKind::Pending])
    }

    /// Dispatches one protocol step to the handler for the local role.
    pub(crate) async fn apply_protocol_payload(
        &mut self,
        trade_id: &TradeId,
        sender: &PeerAddress,
        payload: ProtocolPayload,
    ) -> Result<(), TradeError> {
        let trade = self.pending_trade(trade_id)?;
        if *sender != trade.peer_address {
            return Err(TradeError::protocol_violation(
                trade_id.as_str(),
                format!("{} from unexpected sender {} (peer is {})", payload.name(), sender, trade.peer_address),
            ));
        }

        match payload {
            ProtocolPayload::DepositTxRequest { multisig_address, payout_address } if !trade.role.is_maker() => {
                self.on_deposit_tx_request(trade, multisig_address, payout_address).await
            }
            ProtocolPayload::DepositTxPublished { deposit_tx_id, delayed_payout_tx, multisig_address, payout_address }
                if trade.role.is_maker() =>
            {
                self.on_deposit_tx_published(trade, deposit_tx_id, delayed_payout_tx, multisig_address, payout_address)
            }
            ProtocolPayload::PaymentStarted { payment_reference } if !trade.role.is_buyer() => {
                self.on_payment_started(trade, payment_reference)
            }
            ProtocolPayload::PayoutTxPublished { payout_tx } if trade.role.is_buyer() => self.on_payout_tx_published(trade, payout_tx),
            other => Err(TradeError::protocol_violation(
                trade_id.as_str(),
                format!("{} not expected by role {}", other.name(), trade.role),
            )),
        }
    }

    /// Taker: publish the deposit and pre-sign the delayed payout.
    async fn on_deposit_tx_request(
        &mut self,
        mut trade: Trade,
        peer_multisig: WalletAddress,
        peer_payout: WalletAddress,
    ) -> Result<(), TradeError> {
        ensure_valid_transition(trade.state, TradeState::DepositPublished)?;
        trade.process_model.peer_multisig_address = Some(peer_multisig);
        trade.process_model.peer_payout_address = Some(peer_payout);
        let multisig = escrow_address(&trade)?;

        let deposit_template = TxTemplate {
            kind: TxKind::Deposit,
            inputs: Vec::new(),
            outputs: vec![TxOutput { address: multisig.clone(), amount_sat: deposit_amount(&trade) }],
            fee_sat: trade.fees.tx_fee_sat,
            lock_blocks: None,
        };
        let delayed_template = TxTemplate {
            kind: TxKind::DelayedPayout,
            inputs: vec![multisig],
            outputs: payout_outputs(&trade)?,
            fee_sat: trade.fees.tx_fee_sat,
            lock_blocks: Some(DELAYED_PAYOUT_LOCK_BLOCKS),
        };

        let deposit_tx = self.wallet.sign_transaction(deposit_template).await?;
        let delayed_payout_tx = self.wallet.sign_transaction(delayed_template).await?;
        // A failed broadcast leaves the trade untouched; the caller records the error.
        let deposit_tx_id = self.wallet.broadcast(&deposit_tx).await?;

        trade.deposit_tx_id = Some(deposit_tx_id);
        trade.delayed_payout_tx_id = Some(delayed_payout_tx.tx_id);
        trade.process_model.delayed_payout_tx = Some(delayed_payout_tx.clone());
        trade.set_state(TradeState::DepositPublished)?;
        trade.start_trade_period(now_nanos(), secs_to_nanos(self.config.max_trade_period_secs));
        self.replace_trade(trade.clone())?;
        self.persist(&[RegistryKind::Pending])?;
        info!("deposit published trade_id={} deposit_tx_id={} amount_sat={}", trade.id, deposit_tx_id, deposit_amount(&trade));

        let payload = ProtocolPayload::DepositTxPublished {
            deposit_tx_id,
            delayed_payout_tx: Some(delayed_payout_tx),
            multisig_address: required_address(&trade, &trade.process_model.my_multisig_address, "multisig")?,
            payout_address: required_address(&trade, &trade.process_model.my_payout_address, "payout")?,
        };
        self.send_trade_message(&trade, payload).await
    }

    /// Maker: record the taker's deposit. Without a delayed payout the trade
    /// cannot be safely continued unless faulty delayed txs are allowed.
    fn on_deposit_tx_published(
        &mut self,
        mut trade: Trade,
        deposit_tx_id: TxId,
        delayed_payout_tx: Option<SignedTransaction>,
        peer_multisig: WalletAddress,
        peer_payout: WalletAddress,
    ) -> Result<(), TradeError> {
        ensure_valid_transition(trade.state, TradeState::DepositPublished)?;
        trade.deposit_tx_id = Some(deposit_tx_id);
        trade.process_model.peer_multisig_address = Some(peer_multisig);
        trade.process_model.peer_payout_address = Some(peer_payout);

        match delayed_payout_tx {
            Some(tx) => {
                trade.delayed_payout_tx_id = Some(tx.tx_id);
                trade.process_model.delayed_payout_tx = Some(tx);
            }
            None if self.config.allow_faulty_delayed_txs => {
                warn!("deposit published without delayed payout tx, continuing trade_id={}", trade.id);
            }
            None => {
                let trade_id = trade.id.clone();
                let err = TradeError::protocol_violation(trade_id.as_str(), "deposit published without delayed payout tx");
                self.replace_trade(trade)?;
                self.move_to_failed(&trade_id, &err.to_string())?;
                return Err(err);
            }
        }

        trade.set_state(TradeState::DepositPublished)?;
        trade.start_trade_period(now_nanos(), secs_to_nanos(self.config.max_trade_period_secs));
        info!("peer deposit recorded trade_id={} deposit_tx_id={}", trade.id, deposit_tx_id);
        self.replace_trade(trade)?;
        self.persist(&[RegistryKind::Pending])
    }

    /// Wallet reports the deposit as confirmed.
    pub fn on_deposit_confirmed(&mut self, trade_id: &TradeId) -> Result<(), TradeError> {
        let mut trade = self.pending_trade(trade_id)?;
        if trade.state >= TradeState::DepositConfirmed {
            debug!("deposit confirmation ignored trade_id={} state={}", trade_id, trade.state);
            return Ok(());
        }
        trade.set_state(TradeState::DepositConfirmed)?;
        self.replace_trade(trade)?;
        self.persist(&[RegistryKind::Pending])
    }

    /// Buyer: the counter-currency payment went out. The state only advances
    /// once the seller has been told.
    pub async fn confirm_payment_started(&mut self, trade_id: &TradeId, payment_reference: Option<String>) -> Result<(), TradeError> {
        let mut trade = self.pending_trade(trade_id)?;
        if !trade.role.is_buyer() {
            return Err(TradeError::Validation(format!("only the buyer confirms payment started trade_id={}", trade_id)));
        }
        ensure_valid_transition(trade.state, TradeState::PaymentStarted)?;

        self.send_trade_message(&trade, ProtocolPayload::PaymentStarted { payment_reference: payment_reference.clone() }).await?;

        trade.process_model.payment_reference = payment_reference;
        trade.set_state(TradeState::PaymentStarted)?;
        self.replace_trade(trade)?;
        self.persist(&[RegistryKind::Pending])
    }

    fn on_payment_started(&mut self, mut trade: Trade, payment_reference: Option<String>) -> Result<(), TradeError> {
        trade.set_state(TradeState::PaymentStarted)?;
        trade.process_model.payment_reference = payment_reference;
        self.replace_trade(trade)?;
        self.persist(&[RegistryKind::Pending])
    }

    /// Seller: payment arrived, release escrow with the cooperative payout.
    pub async fn confirm_payment_received(&mut self, trade_id: &TradeId) -> Result<(), TradeError> {
        let mut trade = self.pending_trade(trade_id)?;
        if trade.role.is_buyer() {
            return Err(TradeError::Validation(format!("only the seller confirms payment received trade_id={}", trade_id)));
        }
        ensure_valid_transition(trade.state, TradeState::PaymentReceived)?;

        let template = TxTemplate {
            kind: TxKind::Payout,
            inputs: vec![escrow_address(&trade)?],
            outputs: payout_outputs(&trade)?,
            fee_sat: trade.fees.tx_fee_sat,
            lock_blocks: None,
        };
        let payout_tx = self.wallet.sign_transaction(template).await?;
        let payout_tx_id = self.wallet.broadcast(&payout_tx).await?;

        trade.set_state(TradeState::PaymentReceived)?;
        trade.payout_tx_id = Some(payout_tx_id);
        trade.set_state(TradeState::PayoutPublished)?;
        self.replace_trade(trade.clone())?;
        self.persist(&[RegistryKind::Pending])?;
        info!("payout published trade_id={} payout_tx_id={}", trade_id, payout_tx_id);

        if let Err(err) = self.send_trade_message(&trade, ProtocolPayload::PayoutTxPublished { payout_tx }).await {
            warn!("payout notice not delivered trade_id={} error={}", trade_id, err);
        }
        Ok(())
    }

    fn on_payout_tx_published(&mut self, mut trade: Trade, payout_tx: SignedTransaction) -> Result<(), TradeError> {
        trade.set_state(TradeState::PayoutPublished)?;
        trade.payout_tx_id = Some(payout_tx.tx_id);
        self.replace_trade(trade)?;
        self.persist(&[RegistryKind::Pending])
    }

    async fn send_trade_message(&self, trade: &Trade, payload: ProtocolPayload) -> Result<(), TradeError> {
        let kind = payload.name();
        let message = TradeMessage {
            trade_id: trade.id.clone(),
            uid: MessageUid::random(),
            sender_address: self.transport.local_address(),
            payload,
        };
        match self.transport.send_mailbox(&trade.peer_address, PeerMessage::Trade(message)).await {
            MailboxDelivery::Delivered => {
                debug!("trade message delivered trade_id={} kind={} peer={}", trade.id, kind, trade.peer_address);
                Ok(())
            }
            MailboxDelivery::Queued => {
                debug!("trade message queued in mailbox trade_id={} kind={} peer={}", trade.id, kind, trade.peer_address);
                Ok(())
            }
            MailboxDelivery::Failed(details) => {
                Err(TradeError::MailboxDeliveryFailed { trade_id: trade.id.to_string(), details: format!("{}: {}", kind, details) })
            }
        }
    }
}
