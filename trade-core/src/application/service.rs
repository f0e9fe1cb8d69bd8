use crate::application::trade_manager::{TakeOfferParams, TradeManager};
use crate::domain::{DisputeState, Offer, OpenOffer, Trade};
use crate::foundation::constants::COMMAND_CHANNEL_CAPACITY;
use crate::foundation::{now_nanos, TradeError, TradeId, TxId, WalletAddress};
use crate::infrastructure::transport::{OfferAvailability, TransportEvent};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

type Reply<T> = oneshot::Sender<Result<T, TradeError>>;

/// Requests served by the trade loop. Each carries the sender its result goes to.
pub enum TradeCommand {
    OnAllServicesInitialized { reply: Reply<()> },
    AddOpenOffer { open_offer: OpenOffer, reply: Reply<()> },
    CheckOfferAvailability { offer: Offer, reply: Reply<OfferAvailability> },
    TakeOffer { params: TakeOfferParams, reply: Reply<Trade> },
    OnDepositConfirmed { trade_id: TradeId, reply: Reply<()> },
    ConfirmPaymentStarted { trade_id: TradeId, payment_reference: Option<String>, reply: Reply<()> },
    ConfirmPaymentReceived { trade_id: TradeId, reply: Reply<()> },
    RequestWithdraw { trade_id: TradeId, destination: WalletAddress, amount_sat: u64, fee_sat: u64, reply: Reply<TxId> },
    CloseDisputedTrade { trade_id: TradeId, dispute_state: DisputeState, reply: Reply<()> },
    PublishDelayedPayout { trade_id: TradeId, reply: Reply<()> },
    RecoverFailedTrade { trade_id: TradeId, reply: Reply<bool> },
    MoveToFailed { trade_id: TradeId, reason: String, reply: Reply<()> },
    UpdatePeriodStates { now_nanos: u64, reply: Reply<()> },
    TradeById { trade_id: TradeId, reply: Reply<Option<Trade>> },
    TradesWithLockedFunds { reply: Reply<Vec<Trade>> },
    PendingTradeCount { reply: Reply<usize> },
    WasOfferAlreadyUsed { trade_id: TradeId, reply: Reply<bool> },
    FailedOrClosedTradeIdsWithLockedFunds { reply: Reply<BTreeSet<TradeId>> },
}

impl TradeCommand {
    fn name(&self) -> &'static str {
        match self {
            TradeCommand::OnAllServicesInitialized { .. } => "on_all_services_initialized",
            TradeCommand::AddOpenOffer { .. } => "add_open_offer",
            TradeCommand::CheckOfferAvailability { .. } => "check_offer_availability",
            TradeCommand::TakeOffer { .. } => "take_offer",
            TradeCommand::OnDepositConfirmed { .. } => "on_deposit_confirmed",
            TradeCommand::ConfirmPaymentStarted { .. } => "confirm_payment_started",
            TradeCommand::ConfirmPaymentReceived { .. } => "confirm_payment_received",
            TradeCommand::RequestWithdraw { .. } => "request_withdraw",
            TradeCommand::CloseDisputedTrade { .. } => "close_disputed_trade",
            TradeCommand::PublishDelayedPayout { .. } => "publish_delayed_payout",
            TradeCommand::RecoverFailedTrade { .. } => "recover_failed_trade",
            TradeCommand::MoveToFailed { .. } => "move_to_failed",
            TradeCommand::UpdatePeriodStates { .. } => "update_period_states",
            TradeCommand::TradeById { .. } => "trade_by_id",
            TradeCommand::TradesWithLockedFunds { .. } => "trades_with_locked_funds",
            TradeCommand::PendingTradeCount { .. } => "pending_trade_count",
            TradeCommand::WasOfferAlreadyUsed { .. } => "was_offer_already_used_in_trade",
            TradeCommand::FailedOrClosedTradeIdsWithLockedFunds { .. } => "failed_or_closed_trade_ids_with_locked_funds",
        }
    }
}

/// Cloneable front door to a running trade loop.
#[derive(Clone)]
pub struct TradeManagerHandle {
    tx: mpsc::Sender<TradeCommand>,
}

impl TradeManagerHandle {
    pub fn new(tx: mpsc::Sender<TradeCommand>) -> Self {
        Self { tx }
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> TradeCommand) -> Result<T, TradeError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).await.map_err(|_| TradeError::ChannelClosed("command channel closed".to_string()))?;
        rx.await.map_err(|_| TradeError::ChannelClosed("trade loop dropped the reply".to_string()))?
    }

    pub async fn on_all_services_initialized(&self) -> Result<(), TradeError> {
        self.request(|reply| TradeCommand::OnAllServicesInitialized { reply }).await
    }

    pub async fn add_open_offer(&self, open_offer: OpenOffer) -> Result<(), TradeError> {
        self.request(|reply| TradeCommand::AddOpenOffer { open_offer, reply }).await
    }

    pub async fn check_offer_availability(&self, offer: Offer) -> Result<OfferAvailability, TradeError> {
        self.request(|reply| TradeCommand::CheckOfferAvailability { offer, reply }).await
    }

    pub async fn take_offer(&self, params: TakeOfferParams) -> Result<Trade, TradeError> {
        self.request(|reply| TradeCommand::TakeOffer { params, reply }).await
    }

    pub async fn on_deposit_confirmed(&self, trade_id: TradeId) -> Result<(), TradeError> {
        self.request(|reply| TradeCommand::OnDepositConfirmed { trade_id, reply }).await
    }

    pub async fn confirm_payment_started(&self, trade_id: TradeId, payment_reference: Option<String>) -> Result<(), TradeError> {
        self.request(|reply| TradeCommand::ConfirmPaymentStarted { trade_id, payment_reference, reply }).await
    }

    pub async fn confirm_payment_received(&self, trade_id: TradeId) -> Result<(), TradeError> {
        self.request(|reply| TradeCommand::ConfirmPaymentReceived { trade_id, reply }).await
    }

    pub async fn request_withdraw(
        &self,
        trade_id: TradeId,
        destination: WalletAddress,
        amount_sat: u64,
        fee_sat: u64,
    ) -> Result<TxId, TradeError> {
        self.request(|reply| TradeCommand::RequestWithdraw { trade_id, destination, amount_sat, fee_sat, reply }).await
    }

    pub async fn close_disputed_trade(&self, trade_id: TradeId, dispute_state: DisputeState) -> Result<(), TradeError> {
        self.request(|reply| TradeCommand::CloseDisputedTrade { trade_id, dispute_state, reply }).await
    }

    pub async fn publish_delayed_payout(&self, trade_id: TradeId) -> Result<(), TradeError> {
        self.request(|reply| TradeCommand::PublishDelayedPayout { trade_id, reply }).await
    }

    pub async fn recover_failed_trade(&self, trade_id: TradeId) -> Result<bool, TradeError> {
        self.request(|reply| TradeCommand::RecoverFailedTrade { trade_id, reply }).await
    }

    pub async fn move_to_failed(&self, trade_id: TradeId, reason: impl Into<String>) -> Result<(), TradeError> {
        let reason = reason.into();
        self.request(|reply| TradeCommand::MoveToFailed { trade_id, reason, reply }).await
    }

    pub async fn update_period_states(&self, now_nanos: u64) -> Result<(), TradeError> {
        self.request(|reply| TradeCommand::UpdatePeriodStates { now_nanos, reply }).await
    }

    pub async fn trade_by_id(&self, trade_id: TradeId) -> Result<Option<Trade>, TradeError> {
        self.request(|reply| TradeCommand::TradeById { trade_id, reply }).await
    }

    pub async fn trades_with_locked_funds(&self) -> Result<Vec<Trade>, TradeError> {
        self.request(|reply| TradeCommand::TradesWithLockedFunds { reply }).await
    }

    pub async fn pending_trade_count(&self) -> Result<usize, TradeError> {
        self.request(|reply| TradeCommand::PendingTradeCount { reply }).await
    }

    pub async fn was_offer_already_used_in_trade(&self, trade_id: TradeId) -> Result<bool, TradeError> {
        self.request(|reply| TradeCommand::WasOfferAlreadyUsed { trade_id, reply }).await
    }

    pub async fn failed_or_closed_trade_ids_with_locked_funds(&self) -> Result<BTreeSet<TradeId>, TradeError> {
        self.request(|reply| TradeCommand::FailedOrClosedTradeIdsWithLockedFunds { reply }).await
    }
}

async fn handle_command(manager: &mut TradeManager, command: TradeCommand) {
    debug!("trade command received command={}", command.name());
    // A dropped receiver means the caller gave up waiting; nothing to do.
    match command {
        TradeCommand::OnAllServicesInitialized { reply } => {
            let _ = reply.send(manager.on_all_services_initialized().await);
        }
        TradeCommand::AddOpenOffer { open_offer, reply } => {
            let _ = reply.send(manager.add_open_offer(open_offer));
        }
        TradeCommand::CheckOfferAvailability { offer, reply } => {
            let _ = reply.send(manager.check_offer_availability(&offer).await);
        }
        TradeCommand::TakeOffer { params, reply } => {
            let _ = reply.send(manager.take_offer(params).await);
        }
        TradeCommand::OnDepositConfirmed { trade_id, reply } => {
            let _ = reply.send(manager.on_deposit_confirmed(&trade_id));
        }
        TradeCommand::ConfirmPaymentStarted { trade_id, payment_reference, reply } => {
            let _ = reply.send(manager.confirm_payment_started(&trade_id, payment_reference).await);
        }
        TradeCommand::ConfirmPaymentReceived { trade_id, reply } => {
            let _ = reply.send(manager.confirm_payment_received(&trade_id).await);
        }
        TradeCommand::RequestWithdraw { trade_id, destination, amount_sat, fee_sat, reply } => {
            let _ = reply.send(manager.request_withdraw(&trade_id, &destination, amount_sat, fee_sat).await);
        }
        TradeCommand::CloseDisputedTrade { trade_id, dispute_state, reply } => {
            let _ = reply.send(manager.close_disputed_trade(&trade_id, dispute_state).await);
        }
        TradeCommand::PublishDelayedPayout { trade_id, reply } => {
            let _ = reply.send(manager.publish_delayed_payout(&trade_id).await);
        }
        TradeCommand::RecoverFailedTrade { trade_id, reply } => {
            let _ = reply.send(manager.recover_failed_trade(&trade_id).await);
        }
        TradeCommand::MoveToFailed { trade_id, reason, reply } => {
            let _ = reply.send(manager.move_to_failed(&trade_id, &reason));
        }
        TradeCommand::UpdatePeriodStates { now_nanos, reply } => {
            let _ = reply.send(manager.update_trade_period_states(now_nanos));
        }
        TradeCommand::TradeById { trade_id, reply } => {
            let _ = reply.send(Ok(manager.trade_by_id(&trade_id)));
        }
        TradeCommand::TradesWithLockedFunds { reply } => {
            let _ = reply.send(Ok(manager.trades_with_locked_funds()));
        }
        TradeCommand::PendingTradeCount { reply } => {
            let _ = reply.send(Ok(manager.pending_trade_count()));
        }
        TradeCommand::WasOfferAlreadyUsed { trade_id, reply } => {
            let _ = reply.send(Ok(manager.was_offer_already_used_in_trade(&trade_id)));
        }
        TradeCommand::FailedOrClosedTradeIdsWithLockedFunds { reply } => {
            let _ = reply.send(manager.failed_or_closed_trade_ids_with_locked_funds().await);
        }
    }
}

/// Serves inbound transport events, period ticks and commands one at a time
/// until every handle is dropped.
pub async fn run_trade_loop(mut manager: TradeManager, mut commands: mpsc::Receiver<TradeCommand>) -> Result<(), TradeError> {
    let transport = manager.transport();
    let mut subscription = transport.subscribe().await?;
    let mut inbound_open = true;

    let interval_secs = manager.config().period_check_interval_secs.max(1);
    let mut period_ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    period_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "trade loop started local_address={} pending_count={} period_check_interval_secs={}",
        transport.local_address(),
        manager.pending_trade_count(),
        interval_secs
    );

    loop {
        tokio::select! {
            _ = period_ticker.tick() => {
                manager.initialize_waiting_trades().await;
                if let Err(err) = manager.update_trade_period_states(now_nanos()) {
                    warn!("trade period update failed error={}", err);
                }
            }
            event = subscription.next(), if inbound_open => {
                let Some(event) = event else {
                    warn!("inbound transport stream closed local_address={}", transport.local_address());
                    inbound_open = false;
                    continue;
                };
                match event {
                    Ok(TransportEvent::Message(inbound)) => {
                        if let Err(err) = manager.on_inbound_message(inbound).await {
                            warn!("inbound message handling failed error={}", err);
                        }
                    }
                    Ok(TransportEvent::Bootstrapped) => {
                        info!("network bootstrapped local_address={}", transport.local_address());
                        if let Err(err) = manager.on_bootstrapped().await {
                            warn!("pending trade initialization failed error={}", err);
                        }
                    }
                    Err(err) => warn!("inbound stream error error={}", err),
                }
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    info!("all trade handles dropped, stopping trade loop local_address={}", transport.local_address());
                    break;
                };
                handle_command(&mut manager, command).await;
            }
        }
    }

    Ok(())
}

pub fn spawn_trade_loop(manager: TradeManager) -> (TradeManagerHandle, JoinHandle<Result<(), TradeError>>) {
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let task = tokio::spawn(run_trade_loop(manager, rx));
    (TradeManagerHandle::new(tx), task)
}
