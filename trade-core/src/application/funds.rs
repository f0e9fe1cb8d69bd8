use crate::domain::{AddressContext, AddressEntry};
use crate::foundation::{TradeError, TradeId, TxId, WalletAddress};
use crate::infrastructure::wallet::WalletService;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Escrow and payout addresses a running trade holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradeAddresses {
    pub multisig: AddressEntry,
    pub payout: AddressEntry,
}

/// Reserves, recovers and releases trade address entries against the wallet.
pub struct FundCoordinator {
    wallet: Arc<dyn WalletService>,
}

impl FundCoordinator {
    pub fn new(wallet: Arc<dyn WalletService>) -> Self {
        Self { wallet }
    }

    pub async fn reserve_or_create(&self, trade_id: &TradeId, context: AddressContext) -> Result<AddressEntry, TradeError> {
        let entry = self.wallet.reserve_or_create_address(trade_id, context).await?;
        debug!("address reserved trade_id={} context={} address={}", trade_id, context, entry.address);
        Ok(entry)
    }

    pub async fn recover(&self, trade_id: &TradeId, context: AddressContext) -> Result<Option<AddressEntry>, TradeError> {
        self.wallet.recover_address(trade_id, context).await
    }

    pub async fn release(&self, trade_id: &TradeId, context: AddressContext) -> Result<(), TradeError> {
        self.wallet.release_address(trade_id, context).await?;
        debug!("address released trade_id={} context={}", trade_id, context);
        Ok(())
    }

    /// Reserves both trade entries. Releases the first if the second fails.
    pub async fn reserve_trade_addresses(&self, trade_id: &TradeId) -> Result<TradeAddresses, TradeError> {
        let multisig = self.reserve_or_create(trade_id, AddressContext::MultiSig).await?;
        match self.reserve_or_create(trade_id, AddressContext::TradePayout).await {
            Ok(payout) => Ok(TradeAddresses { multisig, payout }),
            Err(err) => {
                self.release(trade_id, AddressContext::MultiSig).await?;
                Err(err)
            }
        }
    }

    /// All-or-nothing: both entries are looked up before either is claimed.
    /// `Ok(None)` means nothing was touched.
    pub async fn recover_trade_addresses(&self, trade_id: &TradeId) -> Result<Option<TradeAddresses>, TradeError> {
        for context in AddressContext::TRADE {
            if self.wallet.recoverable_address(trade_id, context).await?.is_none() {
                warn!("address not recoverable trade_id={} context={}", trade_id, context);
                return Ok(None);
            }
        }

        let Some(multisig) = self.recover(trade_id, AddressContext::MultiSig).await? else {
            return Ok(None);
        };
        let Some(payout) = self.recover(trade_id, AddressContext::TradePayout).await? else {
            warn!("payout address vanished during recovery trade_id={}", trade_id);
            self.release(trade_id, AddressContext::MultiSig).await?;
            return Ok(None);
        };
        info!("trade addresses recovered trade_id={} multisig={} payout={}", trade_id, multisig.address, payout.address);
        Ok(Some(TradeAddresses { multisig, payout }))
    }

    /// Releases every entry a trade holds. Used on completion.
    pub async fn reset_for_trade(&self, trade_id: &TradeId) -> Result<(), TradeError> {
        for context in [AddressContext::MultiSig, AddressContext::TradePayout, AddressContext::Arbitrator, AddressContext::OfferFunding] {
            self.release(trade_id, context).await?;
        }
        Ok(())
    }

    /// Sends funds out of the trade's payout address.
    pub async fn withdraw(&self, trade_id: &TradeId, destination: &WalletAddress, amount_sat: u64, fee_sat: u64) -> Result<TxId, TradeError> {
        if destination.trim().is_empty() {
            return Err(TradeError::funds(trade_id.as_str(), "withdrawal destination is empty"));
        }
        if amount_sat == 0 {
            return Err(TradeError::funds(trade_id.as_str(), "withdrawal amount must be positive"));
        }
        let entry = self
            .wallet
            .recoverable_address(trade_id, AddressContext::TradePayout)
            .await?
            .ok_or_else(|| TradeError::address_unavailable(trade_id.as_str(), AddressContext::TradePayout))?;
        let tx_id = self.wallet.send_funds(&entry.address, destination, amount_sat, fee_sat).await?;
        info!(
            "withdrawal sent trade_id={} from={} to={} amount_sat={} fee_sat={} tx_id={}",
            trade_id, entry.address, destination, amount_sat, fee_sat, tx_id
        );
        Ok(tx_id)
    }

    /// Returns funded offer-funding entries to the available pool, except those
    /// belonging to offers in `keep`.
    pub async fn sweep_offer_funding(&self, keep: &BTreeSet<TradeId>) -> Result<usize, TradeError> {
        let mut swept = 0;
        for entry in self.wallet.address_entries(AddressContext::OfferFunding).await? {
            let Some(offer_id) = entry.trade_id().cloned() else {
                continue;
            };
            if keep.contains(&offer_id) {
                continue;
            }
            if self.wallet.balance(&entry.address).await? == 0 {
                continue;
            }
            warn!("sweeping stale offer funding entry at startup offer_id={} address={}", offer_id, entry.address);
            self.release(&offer_id, AddressContext::OfferFunding).await?;
            swept += 1;
        }
        Ok(swept)
    }
}
