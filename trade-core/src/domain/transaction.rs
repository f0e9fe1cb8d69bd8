use crate::foundation::{TxId, WalletAddress};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    Deposit,
    DelayedPayout,
    Payout,
    Withdrawal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: WalletAddress,
    pub amount_sat: u64,
}

/// Unsigned transaction handed to the wallet for signing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxTemplate {
    pub kind: TxKind,
    /// Addresses to spend from. Empty lets the wallet select coins.
    pub inputs: Vec<WalletAddress>,
    pub outputs: Vec<TxOutput>,
    pub fee_sat: u64,
    /// Relative block height before the transaction may be mined.
    pub lock_blocks: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx_id: TxId,
    pub kind: TxKind,
    pub raw: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxConfidence {
    Unknown,
    Pending,
    Building { depth: u32 },
    Dead,
}

impl TxConfidence {
    pub fn is_building(&self) -> bool {
        matches!(self, TxConfidence::Building { .. })
    }
}
