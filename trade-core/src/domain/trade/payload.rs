use crate::domain::transaction::SignedTransaction;
use crate::foundation::{TxId, WalletAddress};
use serde::{Deserialize, Serialize};

/// Trade protocol step carried inside a trade message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolPayload {
    /// Maker to taker: escrow and payout addresses for the deposit.
    DepositTxRequest { multisig_address: WalletAddress, payout_address: WalletAddress },
    /// Taker to maker: deposit is on the network, with the pre-signed fallback.
    DepositTxPublished {
        deposit_tx_id: TxId,
        delayed_payout_tx: Option<SignedTransaction>,
        multisig_address: WalletAddress,
        payout_address: WalletAddress,
    },
    /// Buyer to seller: counter-currency payment was initiated.
    PaymentStarted { payment_reference: Option<String> },
    /// Seller to buyer: cooperative payout is on the network.
    PayoutTxPublished { payout_tx: SignedTransaction },
}

impl ProtocolPayload {
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolPayload::DepositTxRequest { .. } => "DepositTxRequest",
            ProtocolPayload::DepositTxPublished { .. } => "DepositTxPublished",
            ProtocolPayload::PaymentStarted { .. } => "PaymentStarted",
            ProtocolPayload::PayoutTxPublished { .. } => "PayoutTxPublished",
        }
    }
}
