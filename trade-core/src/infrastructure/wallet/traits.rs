use crate::domain::{AddressContext, AddressEntry, SignedTransaction, TxConfidence, TxTemplate};
use crate::foundation::{TradeError, TradeId, TxId, WalletAddress};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, TradeError>;

/// Wallet collaborator. Signing and broadcast are opaque; the wallet owns the
/// address pool and answers balance and confidence queries.
#[async_trait]
pub trait WalletService: Send + Sync {
    /// Returns the entry owned by (trade, context), claiming a fresh one from
    /// the available pool if none exists yet.
    async fn reserve_or_create_address(&self, trade_id: &TradeId, context: AddressContext) -> Result<AddressEntry>;

    /// Read-only: the entry that `recover_address` would return, if any.
    async fn recoverable_address(&self, trade_id: &TradeId, context: AddressContext) -> Result<Option<AddressEntry>>;

    /// Re-derives and claims the entry a trade previously held.
    async fn recover_address(&self, trade_id: &TradeId, context: AddressContext) -> Result<Option<AddressEntry>>;

    /// Returns the entry to the available pool. No-op when not owned.
    async fn release_address(&self, trade_id: &TradeId, context: AddressContext) -> Result<()>;

    async fn address_entries(&self, context: AddressContext) -> Result<Vec<AddressEntry>>;

    async fn unconfirmed_tx_count(&self) -> Result<u32>;

    async fn sign_transaction(&self, template: TxTemplate) -> Result<SignedTransaction>;

    async fn broadcast(&self, tx: &SignedTransaction) -> Result<TxId>;

    async fn send_funds(&self, from: &WalletAddress, to: &WalletAddress, amount_sat: u64, fee_sat: u64) -> Result<TxId>;

    async fn balance(&self, address: &WalletAddress) -> Result<u64>;

    async fn confidence(&self, tx_id: &TxId) -> Result<TxConfidence>;
}
