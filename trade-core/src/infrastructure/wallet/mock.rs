use super::traits::WalletService;
use crate::domain::{AddressContext, AddressEntry, SignedTransaction, TxConfidence, TxTemplate};
use crate::foundation::{TradeError, TradeId, TxId, WalletAddress};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundsTransfer {
    pub from: WalletAddress,
    pub to: WalletAddress,
    pub amount_sat: u64,
    pub fee_sat: u64,
}

#[derive(Default)]
struct WalletInner {
    entries: Vec<AddressEntry>,
    // Last address each (trade, context) owned; what recovery re-derives from.
    history: HashMap<(TradeId, AddressContext), WalletAddress>,
    address_prefix: String,
    next_address: u64,
    next_tx: u64,
    unconfirmed: u32,
    balances: HashMap<WalletAddress, u64>,
    confidence: HashMap<TxId, TxConfidence>,
    templates: HashMap<TxId, TxTemplate>,
    broadcasts: Vec<SignedTransaction>,
    transfers: Vec<FundsTransfer>,
    fail_broadcast: Option<String>,
    fail_send_funds: Option<String>,
    fail_confidence: HashSet<TxId>,
    fail_reserve: bool,
}

impl WalletInner {
    fn owned_index(&self, trade_id: &TradeId, context: AddressContext) -> Option<usize> {
        self.entries.iter().position(|entry| entry.is_owned_by(trade_id, context))
    }

    fn recoverable_index(&self, trade_id: &TradeId, context: AddressContext) -> Option<usize> {
        if let Some(idx) = self.owned_index(trade_id, context) {
            return Some(idx);
        }
        let address = self.history.get(&(trade_id.clone(), context))?;
        self.entries.iter().position(|entry| &entry.address == address && entry.is_available())
    }

    fn claim(&mut self, idx: usize, trade_id: &TradeId, context: AddressContext) -> AddressEntry {
        let entry = &mut self.entries[idx];
        entry.owner = Some((trade_id.clone(), context));
        self.history.insert((trade_id.clone(), context), entry.address.clone());
        entry.clone()
    }

    fn next_tx_id(&mut self) -> TxId {
        self.next_tx += 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&self.next_tx.to_be_bytes());
        TxId::new(bytes)
    }
}

/// In-memory wallet. Broadcasting a signed transaction credits its outputs.
#[derive(Clone, Default)]
pub struct MockWallet {
    inner: Arc<Mutex<WalletInner>>,
}

impl MockWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh addresses become `<prefix>addr-N`, keeping two wallets in one test apart.
    pub fn with_address_prefix(prefix: &str) -> Self {
        let wallet = Self::default();
        if let Ok(mut inner) = wallet.lock_inner() {
            inner.address_prefix = prefix.to_string();
        }
        wallet
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, WalletInner>, TradeError> {
        self.inner.lock().map_err(|_| TradeError::StorageError { operation: "mock wallet lock".to_string(), details: "poisoned".to_string() })
    }

    pub fn add_entry(&self, entry: AddressEntry) {
        if let Ok(mut inner) = self.lock_inner() {
            if let Some((trade_id, context)) = entry.owner.clone() {
                inner.history.insert((trade_id, context), entry.address.clone());
            }
            inner.entries.push(entry);
        }
    }

    /// Drops the wallet's knowledge of (trade, context) so it can no longer be recovered.
    pub fn forget(&self, trade_id: &TradeId, context: AddressContext) {
        if let Ok(mut inner) = self.lock_inner() {
            inner.history.remove(&(trade_id.clone(), context));
            if let Some(idx) = inner.owned_index(trade_id, context) {
                inner.entries[idx].owner = None;
            }
        }
    }

    pub fn set_unconfirmed_tx_count(&self, count: u32) {
        if let Ok(mut inner) = self.lock_inner() {
            inner.unconfirmed = count;
        }
    }

    pub fn set_balance(&self, address: &WalletAddress, amount_sat: u64) {
        if let Ok(mut inner) = self.lock_inner() {
            inner.balances.insert(address.clone(), amount_sat);
        }
    }

    pub fn set_confidence(&self, tx_id: TxId, confidence: TxConfidence) {
        if let Ok(mut inner) = self.lock_inner() {
            inner.confidence.insert(tx_id, confidence);
        }
    }

    pub fn set_fail_broadcast(&self, reason: Option<&str>) {
        if let Ok(mut inner) = self.lock_inner() {
            inner.fail_broadcast = reason.map(str::to_string);
        }
    }

    pub fn set_fail_send_funds(&self, reason: Option<&str>) {
        if let Ok(mut inner) = self.lock_inner() {
            inner.fail_send_funds = reason.map(str::to_string);
        }
    }

    pub fn set_fail_reserve(&self, fail: bool) {
        if let Ok(mut inner) = self.lock_inner() {
            inner.fail_reserve = fail;
        }
    }

    /// Makes confidence lookups for `tx_id` fail until cleared.
    pub fn set_fail_confidence(&self, tx_id: TxId, fail: bool) {
        if let Ok(mut inner) = self.lock_inner() {
            if fail {
                inner.fail_confidence.insert(tx_id);
            } else {
                inner.fail_confidence.remove(&tx_id);
            }
        }
    }

    pub fn entry_for(&self, trade_id: &TradeId, context: AddressContext) -> Option<AddressEntry> {
        let inner = self.lock_inner().ok()?;
        inner.owned_index(trade_id, context).map(|idx| inner.entries[idx].clone())
    }

    pub fn available_count(&self) -> usize {
        self.lock_inner().map(|inner| inner.entries.iter().filter(|entry| entry.is_available()).count()).unwrap_or(0)
    }

    pub fn broadcasts(&self) -> Vec<SignedTransaction> {
        self.lock_inner().map(|inner| inner.broadcasts.clone()).unwrap_or_default()
    }

    pub fn transfers(&self) -> Vec<FundsTransfer> {
        self.lock_inner().map(|inner| inner.transfers.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WalletService for MockWallet {
    async fn reserve_or_create_address(&self, trade_id: &TradeId, context: AddressContext) -> Result<AddressEntry, TradeError> {
        let mut inner = self.lock_inner()?;
        if inner.fail_reserve {
            return Err(TradeError::address_unavailable(trade_id.as_str(), context));
        }
        if let Some(idx) = inner.owned_index(trade_id, context) {
            return Ok(inner.entries[idx].clone());
        }
        let idx = match inner.entries.iter().position(AddressEntry::is_available) {
            Some(idx) => idx,
            None => {
                inner.next_address += 1;
                let address = WalletAddress::from(format!("{}addr-{}", inner.address_prefix, inner.next_address));
                inner.entries.push(AddressEntry::available(address));
                inner.entries.len() - 1
            }
        };
        Ok(inner.claim(idx, trade_id, context))
    }

    async fn recoverable_address(&self, trade_id: &TradeId, context: AddressContext) -> Result<Option<AddressEntry>, TradeError> {
        let inner = self.lock_inner()?;
        Ok(inner.recoverable_index(trade_id, context).map(|idx| {
            let mut entry = inner.entries[idx].clone();
            entry.owner = Some((trade_id.clone(), context));
            entry
        }))
    }

    async fn recover_address(&self, trade_id: &TradeId, context: AddressContext) -> Result<Option<AddressEntry>, TradeError> {
        let mut inner = self.lock_inner()?;
        Ok(inner.recoverable_index(trade_id, context).map(|idx| inner.claim(idx, trade_id, context)))
    }

    async fn release_address(&self, trade_id: &TradeId, context: AddressContext) -> Result<(), TradeError> {
        let mut inner = self.lock_inner()?;
        if let Some(idx) = inner.owned_index(trade_id, context) {
            inner.entries[idx].owner = None;
        }
        Ok(())
    }

    async fn address_entries(&self, context: AddressContext) -> Result<Vec<AddressEntry>, TradeError> {
        let inner = self.lock_inner()?;
        Ok(inner.entries.iter().filter(|entry| entry.context() == Some(context)).cloned().collect())
    }

    async fn unconfirmed_tx_count(&self) -> Result<u32, TradeError> {
        Ok(self.lock_inner()?.unconfirmed)
    }

    async fn sign_transaction(&self, template: TxTemplate) -> Result<SignedTransaction, TradeError> {
        let raw = bincode::serialize(&template)?;
        let mut inner = self.lock_inner()?;
        let tx_id = inner.next_tx_id();
        let kind = template.kind;
        inner.templates.insert(tx_id, template);
        Ok(SignedTransaction { tx_id, kind, raw })
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> Result<TxId, TradeError> {
        let mut inner = self.lock_inner()?;
        if let Some(reason) = inner.fail_broadcast.clone() {
            return Err(TradeError::broadcast_failure(tx.tx_id.to_string(), reason));
        }
        if let Some(template) = inner.templates.get(&tx.tx_id).cloned() {
            for output in template.outputs {
                *inner.balances.entry(output.address).or_insert(0) += output.amount_sat;
            }
        }
        inner.confidence.insert(tx.tx_id, TxConfidence::Pending);
        inner.broadcasts.push(tx.clone());
        Ok(tx.tx_id)
    }

    async fn send_funds(&self, from: &WalletAddress, to: &WalletAddress, amount_sat: u64, fee_sat: u64) -> Result<TxId, TradeError> {
        let mut inner = self.lock_inner()?;
        if let Some(reason) = inner.fail_send_funds.clone() {
            return Err(TradeError::broadcast_failure(from.to_string(), reason));
        }
        let needed = amount_sat.saturating_add(fee_sat);
        let available = inner.balances.get(from).copied().unwrap_or(0);
        if available < needed {
            return Err(TradeError::funds(from.to_string(), format!("insufficient funds available={} needed={}", available, needed)));
        }
        inner.balances.insert(from.clone(), available - needed);
        *inner.balances.entry(to.clone()).or_insert(0) += amount_sat;
        inner.transfers.push(FundsTransfer { from: from.clone(), to: to.clone(), amount_sat, fee_sat });
        let tx_id = inner.next_tx_id();
        inner.confidence.insert(tx_id, TxConfidence::Pending);
        Ok(tx_id)
    }

    async fn balance(&self, address: &WalletAddress) -> Result<u64, TradeError> {
        Ok(self.lock_inner()?.balances.get(address).copied().unwrap_or(0))
    }

    async fn confidence(&self, tx_id: &TxId) -> Result<TxConfidence, TradeError> {
        let inner = self.lock_inner()?;
        if inner.fail_confidence.contains(tx_id) {
            return Err(TradeError::Message(format!("confidence lookup failed tx_id={}", tx_id)));
        }
        Ok(inner.confidence.get(tx_id).copied().unwrap_or(TxConfidence::Unknown))
    }
}
