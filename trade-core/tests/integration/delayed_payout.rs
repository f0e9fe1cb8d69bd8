use crate::fixtures::{delayed_payout_tx, tx_id, TestNode, TradeBuilder, TEST_MAKER_ADDRESS, TEST_OFFER_ID, TEST_TAKER_ADDRESS};
use std::sync::Arc;
use trade_core::domain::{AddressContext, AddressEntry, RegistryKind, TradeRole, TradeState};
use trade_core::foundation::{MessageUid, PeerAddress, TradeError, TradeId, WalletAddress};
use trade_core::infrastructure::transport::{
    Delivery, InboundMessage, MailboxDelivery, MailboxEntry, MockHub, PeerMessage, PeerPublishedDelayedPayoutTxMessage,
};

fn node_with_deposit(with_delayed_payout: bool) -> TestNode {
    let mut builder = TradeBuilder::default()
        .role(TradeRole::MAKER_SELLER)
        .state(TradeState::DepositConfirmed)
        .deposit_tx_id(tx_id(1))
        .my_addresses("maker-multisig-3", "maker-payout-3");
    if with_delayed_payout {
        builder = builder.delayed_payout_tx(delayed_payout_tx(7));
    }
    let node = TestNode::with_persisted(Arc::new(MockHub::new()), TEST_MAKER_ADDRESS, &[(RegistryKind::Pending, vec![builder.build()])]);
    let trade_id = TradeId::from(TEST_OFFER_ID);
    node.wallet.add_entry(AddressEntry::owned(WalletAddress::from("maker-multisig-3"), trade_id.clone(), AddressContext::MultiSig));
    node.wallet.add_entry(AddressEntry::owned(WalletAddress::from("maker-payout-3"), trade_id, AddressContext::TradePayout));
    node
}

#[tokio::test]
async fn test_publish_delayed_payout_when_mailbox_accepts_then_flagged_and_peer_notified() {
    for outcome in [MailboxDelivery::Delivered, MailboxDelivery::Queued] {
        let mut node = node_with_deposit(true);
        node.transport.set_mailbox_outcome(Some(outcome.clone())).await;
        let trade_id = TradeId::from(TEST_OFFER_ID);

        node.manager.publish_delayed_payout(&trade_id).await.expect("publish delayed payout");

        assert_eq!(node.wallet.broadcasts(), vec![delayed_payout_tx(7)]);
        let trade = node.manager.trade_by_id(&trade_id).expect("trade");
        assert!(trade.delayed_payout_published, "outcome={outcome:?}");
        assert!(!trade.has_locked_funds());
        assert!(node.wallet.entry_for(&trade_id, AddressContext::MultiSig).is_none());
        assert!(node.wallet.entry_for(&trade_id, AddressContext::TradePayout).is_some());
        assert!(node.persisted(RegistryKind::Pending)[0].delayed_payout_published);

        let sent = node.transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].delivery, Delivery::Mailbox);
        assert_eq!(sent[0].peer, PeerAddress::from(TEST_TAKER_ADDRESS));
        assert!(matches!(&sent[0].message, PeerMessage::PeerPublishedDelayedPayoutTx(notice) if notice.trade_id == trade_id));
    }
}

#[tokio::test]
async fn test_publish_delayed_payout_when_mailbox_fails_then_error_after_broadcast() {
    let mut node = node_with_deposit(true);
    node.transport.set_mailbox_outcome(Some(MailboxDelivery::Failed("peer mailbox unreachable".to_string()))).await;
    let trade_id = TradeId::from(TEST_OFFER_ID);

    let err = node.manager.publish_delayed_payout(&trade_id).await.expect_err("mailbox failure");
    assert!(matches!(err, TradeError::MailboxDeliveryFailed { ref details, .. } if details == "peer mailbox unreachable"));
    assert!(node.manager.trade_by_id(&trade_id).expect("trade").delayed_payout_published);
}

#[tokio::test]
async fn test_publish_delayed_payout_when_missing_tx_or_trade_then_rejected() {
    let mut node = node_with_deposit(false);
    let err = node.manager.publish_delayed_payout(&TradeId::from(TEST_OFFER_ID)).await.expect_err("no delayed tx");
    assert!(matches!(err, TradeError::MissingDelayedPayoutTx(_)));

    let err = node.manager.publish_delayed_payout(&TradeId::from("offer-missing")).await.expect_err("unknown trade");
    assert!(matches!(err, TradeError::TradeNotFound(_)));
    assert!(node.wallet.broadcasts().is_empty());
    assert!(node.transport.sent().await.is_empty());
}

#[tokio::test]
async fn test_publish_delayed_payout_when_broadcast_fails_then_nothing_released() {
    let mut node = node_with_deposit(true);
    node.wallet.set_fail_broadcast(Some("mempool full"));
    let trade_id = TradeId::from(TEST_OFFER_ID);

    let err = node.manager.publish_delayed_payout(&trade_id).await.expect_err("broadcast fails");
    assert!(matches!(err, TradeError::BroadcastFailure { .. }));
    assert!(!node.manager.trade_by_id(&trade_id).expect("trade").delayed_payout_published);
    assert!(node.wallet.entry_for(&trade_id, AddressContext::MultiSig).is_some());
}

#[tokio::test]
async fn test_peer_published_delayed_payout_when_received_from_mailbox_then_flag_set_and_entry_removed() {
    let mut node = node_with_deposit(true);
    let trade_id = TradeId::from(TEST_OFFER_ID);
    let sender = PeerAddress::from(TEST_TAKER_ADDRESS);
    let inbound = InboundMessage {
        delivery: Delivery::Mailbox,
        sender_address: sender.clone(),
        message: PeerMessage::PeerPublishedDelayedPayoutTx(PeerPublishedDelayedPayoutTxMessage {
            uid: MessageUid::from("uid-dpt"),
            trade_id: trade_id.clone(),
            recipient_address: PeerAddress::from(TEST_MAKER_ADDRESS),
        }),
    };

    node.manager.on_inbound_message(inbound.clone()).await.expect("notice");
    node.manager.on_inbound_message(inbound).await.expect("redelivered notice");

    assert!(node.manager.trade_by_id(&trade_id).expect("trade").delayed_payout_published);
    let entry = MailboxEntry { uid: MessageUid::from("uid-dpt"), sender_address: sender };
    assert_eq!(node.transport.removed_mailbox_entries().await, vec![entry.clone(), entry]);
}
