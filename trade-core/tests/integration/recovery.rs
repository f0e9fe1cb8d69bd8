use crate::fixtures::{tx_id, ObservedEvent, TestNode, TradeBuilder, TEST_MAKER_ADDRESS, TEST_OFFER_ID};
use std::sync::Arc;
use trade_core::domain::{AddressContext, AddressEntry, RegistryKind, TradeState};
use trade_core::foundation::{TradeError, TradeId, WalletAddress};
use trade_core::infrastructure::transport::MockHub;
use trade_core::infrastructure::wallet::WalletService;

const MULTISIG: &str = "maker-multisig-7";
const PAYOUT: &str = "maker-payout-7";

/// Failed trade that got as far as PaymentStarted; DepositPublished was the last wallet-verified state.
fn failed_node() -> TestNode {
    let mut trade = TradeBuilder::default()
        .state(TradeState::PaymentStarted)
        .deposit_tx_id(tx_id(1))
        .my_addresses(MULTISIG, PAYOUT)
        .error_message("payout signing failed")
        .build();
    trade.last_verified_state = TradeState::DepositPublished;
    let node = TestNode::with_persisted(Arc::new(MockHub::new()), TEST_MAKER_ADDRESS, &[(RegistryKind::Failed, vec![trade])]);

    let trade_id = TradeId::from(TEST_OFFER_ID);
    node.wallet.add_entry(AddressEntry::owned(WalletAddress::from(MULTISIG), trade_id.clone(), AddressContext::MultiSig));
    node.wallet.add_entry(AddressEntry::owned(WalletAddress::from(PAYOUT), trade_id, AddressContext::TradePayout));
    node
}

#[tokio::test]
async fn test_recover_failed_trade_when_addresses_recoverable_then_back_in_pending() {
    let mut node = failed_node();
    let trade_id = TradeId::from(TEST_OFFER_ID);
    node.wallet.release_address(&trade_id, AddressContext::MultiSig).await.expect("release multisig");

    assert!(node.manager.recover_failed_trade(&trade_id).await.expect("recover"));

    let trade = node.manager.trade_by_id(&trade_id).expect("trade");
    assert_eq!(node.manager.registry().kind_of(&trade_id), Some(RegistryKind::Pending));
    assert_eq!(trade.state, TradeState::DepositPublished);
    assert!(trade.error_message.is_none());
    assert_eq!(trade.process_model.my_multisig_address, Some(WalletAddress::from(MULTISIG)));
    assert!(node.wallet.entry_for(&trade_id, AddressContext::MultiSig).is_some(), "multisig claimed again");

    assert!(node.persisted(RegistryKind::Failed).is_empty());
    assert_eq!(node.persisted(RegistryKind::Pending).len(), 1);
    assert_eq!(node.observer.count(|event| matches!(event, ObservedEvent::Added(id) if *id == trade_id)), 1);
}

#[tokio::test]
async fn test_recover_failed_trade_when_one_address_lost_then_nothing_changes() {
    let mut node = failed_node();
    let trade_id = TradeId::from(TEST_OFFER_ID);
    node.wallet.release_address(&trade_id, AddressContext::MultiSig).await.expect("release multisig");
    node.wallet.forget(&trade_id, AddressContext::TradePayout);

    assert!(!node.manager.recover_failed_trade(&trade_id).await.expect("recover"));

    assert_eq!(node.manager.registry().kind_of(&trade_id), Some(RegistryKind::Failed));
    let trade = node.manager.trade_by_id(&trade_id).expect("trade");
    assert_eq!(trade.state, TradeState::PaymentStarted);
    assert!(trade.error_message.is_some());
    assert!(node.wallet.entry_for(&trade_id, AddressContext::MultiSig).is_none(), "multisig must not be claimed");
    assert_eq!(node.wallet.available_count(), 2);
}

#[tokio::test]
async fn test_recover_failed_trade_when_pending_initialized_then_trade_initialized_immediately() {
    let mut node = failed_node();
    let trade_id = TradeId::from(TEST_OFFER_ID);
    node.manager.on_all_services_initialized().await.expect("services initialized");

    assert!(node.manager.recover_failed_trade(&trade_id).await.expect("recover"));
    assert!(node.manager.trade_by_id(&trade_id).expect("trade").initialized);
}

#[tokio::test]
async fn test_recover_failed_trade_when_not_failed_then_false_or_not_found() {
    let mut node = failed_node();
    let trade_id = TradeId::from(TEST_OFFER_ID);
    assert!(node.manager.recover_failed_trade(&trade_id).await.expect("recover"));

    assert!(!node.manager.recover_failed_trade(&trade_id).await.expect("already pending"));
    let err = node.manager.recover_failed_trade(&TradeId::from("offer-missing")).await.expect_err("unknown");
    assert!(matches!(err, TradeError::TradeNotFound(_)));
}

#[tokio::test]
async fn test_move_to_failed_when_pending_then_error_recorded_and_persisted() {
    let mut node = failed_node();
    let trade_id = TradeId::from(TEST_OFFER_ID);
    assert!(node.manager.recover_failed_trade(&trade_id).await.expect("recover"));

    node.manager.move_to_failed(&trade_id, "counterparty unresponsive").expect("move to failed");

    let failed = node.persisted(RegistryKind::Failed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error_message.as_deref(), Some("counterparty unresponsive"));
    assert_eq!(node.observer.count(|event| matches!(event, ObservedEvent::Removed(_, Some(RegistryKind::Failed)))), 1);
}
