use crate::fixtures::{
    trade_message, tx_id, ObservedEvent, OfferBuilder, TestNode, TradeBuilder, TEST_MAKER_ADDRESS, TEST_OFFER_ID, TEST_TAKER_ADDRESS,
};
use std::sync::Arc;
use trade_core::domain::{
    AddressContext, AddressEntry, OpenOffer, ProtocolPayload, RegistryKind, SignedTransaction, TradePeriodState, TradeRole,
    TradeState, TxConfidence, TxKind,
};
use trade_core::foundation::{MessageUid, PeerAddress, TradeId, WalletAddress};
use trade_core::infrastructure::transport::{Delivery, MailboxEntry, MockHub, PeerMessage};

fn single_pending(builder: TradeBuilder, address: &str) -> TestNode {
    TestNode::with_persisted(Arc::new(MockHub::new()), address, &[(RegistryKind::Pending, vec![builder.build()])])
}

#[tokio::test]
async fn test_startup_when_deposit_confirmed_in_wallet_then_state_refreshed() {
    let builder = TradeBuilder::default().state(TradeState::DepositPublished).deposit_tx_id(tx_id(1));
    let mut node = single_pending(builder, TEST_MAKER_ADDRESS);
    node.wallet.set_confidence(tx_id(1), TxConfidence::Building { depth: 1 });
    let trade_id = TradeId::from(TEST_OFFER_ID);

    assert_eq!(node.observer.events(), vec![ObservedEvent::PendingCount(1)]);
    node.manager.on_all_services_initialized().await.expect("init");

    let trade = node.manager.trade_by_id(&trade_id).expect("trade");
    assert_eq!(trade.state, TradeState::DepositConfirmed);
    assert!(trade.initialized);
    assert_eq!(node.persisted(RegistryKind::Pending)[0].state, TradeState::DepositConfirmed);
}

#[tokio::test]
async fn test_startup_when_network_not_bootstrapped_then_initialization_waits() {
    let mut node = single_pending(TradeBuilder::default().state(TradeState::DepositPublished), TEST_MAKER_ADDRESS);
    let trade_id = TradeId::from(TEST_OFFER_ID);

    node.manager.on_bootstrapped().await.expect("bootstrap before services");
    assert!(!node.manager.trade_by_id(&trade_id).expect("trade").initialized);

    node.transport.set_bootstrapped(false);
    node.manager.on_all_services_initialized().await.expect("services");
    assert!(!node.manager.trade_by_id(&trade_id).expect("trade").initialized);

    node.transport.set_bootstrapped(true);
    node.manager.on_bootstrapped().await.expect("bootstrap");
    assert!(node.manager.trade_by_id(&trade_id).expect("trade").initialized);
}

#[tokio::test]
async fn test_startup_when_message_arrives_before_init_then_parked_and_drained() {
    let builder = TradeBuilder::default()
        .role(TradeRole::TAKER_BUYER)
        .peer(TEST_MAKER_ADDRESS)
        .state(TradeState::PaymentStarted)
        .deposit_tx_id(tx_id(1));
    let mut node = single_pending(builder, TEST_TAKER_ADDRESS);
    node.transport.set_bootstrapped(false);
    node.manager.on_all_services_initialized().await.expect("services");
    let trade_id = TradeId::from(TEST_OFFER_ID);

    let payout_tx = SignedTransaction { tx_id: tx_id(9), kind: TxKind::Payout, raw: vec![9; 4] };
    let payload = ProtocolPayload::PayoutTxPublished { payout_tx };
    let inbound = trade_message(TEST_OFFER_ID, "uid-payout", TEST_MAKER_ADDRESS, Delivery::Mailbox, payload);
    node.manager.on_inbound_message(inbound).await.expect("park");

    let parked = node.manager.trade_by_id(&trade_id).expect("trade");
    assert_eq!(parked.state, TradeState::PaymentStarted);
    assert_eq!(parked.process_model.inbox.len(), 1);
    assert_eq!(node.persisted(RegistryKind::Pending)[0].process_model.inbox.len(), 1);
    assert!(node.transport.sent().await.is_empty());

    node.transport.set_bootstrapped(true);
    node.manager.on_bootstrapped().await.expect("bootstrap");

    let trade = node.manager.trade_by_id(&trade_id).expect("trade");
    assert_eq!(trade.state, TradeState::PayoutPublished);
    assert_eq!(trade.payout_tx_id, Some(tx_id(9)));
    assert!(trade.process_model.inbox.is_empty());

    let entry = MailboxEntry { uid: MessageUid::from("uid-payout"), sender_address: PeerAddress::from(TEST_MAKER_ADDRESS) };
    assert_eq!(node.transport.removed_mailbox_entries().await, vec![entry]);

    let sent = node.transport.sent().await;
    assert_eq!(sent.len(), 1);
    match &sent[0].message {
        PeerMessage::Ack(ack) => {
            assert!(ack.success);
            assert_eq!(ack.source_uid, MessageUid::from("uid-payout"));
        }
        other => panic!("expected ack, got {:?}", other),
    }
}

#[tokio::test]
async fn test_startup_when_one_trade_fails_to_initialize_then_others_proceed_and_failed_one_retried() {
    let failing = TradeBuilder::default()
        .id("offer-a")
        .role(TradeRole::TAKER_BUYER)
        .peer(TEST_MAKER_ADDRESS)
        .state(TradeState::DepositPublished)
        .deposit_tx_id(tx_id(1))
        .build();
    let healthy = TradeBuilder::default().id("offer-b").state(TradeState::DepositPublished).deposit_tx_id(tx_id(2)).build();
    let mut node =
        TestNode::with_persisted(Arc::new(MockHub::new()), TEST_TAKER_ADDRESS, &[(RegistryKind::Pending, vec![failing, healthy])]);
    node.wallet.set_fail_confidence(tx_id(1), true);
    node.wallet.set_confidence(tx_id(2), TxConfidence::Building { depth: 1 });
    let offer_a = TradeId::from("offer-a");
    let offer_b = TradeId::from("offer-b");

    node.manager.on_all_services_initialized().await.expect("init continues past a failing trade");

    let trade_b = node.manager.trade_by_id(&offer_b).expect("offer-b");
    assert!(trade_b.initialized);
    assert_eq!(trade_b.state, TradeState::DepositConfirmed);
    assert!(!node.manager.trade_by_id(&offer_a).expect("offer-a").initialized);

    let payout_tx = SignedTransaction { tx_id: tx_id(9), kind: TxKind::Payout, raw: vec![9; 4] };
    let payload = ProtocolPayload::PayoutTxPublished { payout_tx };
    let inbound = trade_message("offer-a", "uid-waiting", TEST_MAKER_ADDRESS, Delivery::Mailbox, payload);
    node.manager.on_inbound_message(inbound).await.expect("park");
    assert_eq!(node.manager.trade_by_id(&offer_a).expect("offer-a").process_model.inbox.len(), 1);

    assert_eq!(node.manager.initialize_waiting_trades().await, 1, "lookup still failing");
    node.wallet.set_fail_confidence(tx_id(1), false);
    assert_eq!(node.manager.initialize_waiting_trades().await, 0);

    let trade_a = node.manager.trade_by_id(&offer_a).expect("offer-a");
    assert!(trade_a.initialized);
    assert!(trade_a.process_model.inbox.is_empty());
    let entry = MailboxEntry { uid: MessageUid::from("uid-waiting"), sender_address: PeerAddress::from(TEST_MAKER_ADDRESS) };
    assert_eq!(node.transport.removed_mailbox_entries().await, vec![entry]);
}

#[tokio::test]
async fn test_startup_when_message_from_unexpected_sender_then_failure_acked() {
    let builder = TradeBuilder::default().role(TradeRole::TAKER_BUYER).peer(TEST_MAKER_ADDRESS).state(TradeState::PaymentStarted);
    let mut node = single_pending(builder, TEST_TAKER_ADDRESS);
    node.manager.on_all_services_initialized().await.expect("init");
    let trade_id = TradeId::from(TEST_OFFER_ID);

    let payout_tx = SignedTransaction { tx_id: tx_id(9), kind: TxKind::Payout, raw: vec![9; 4] };
    let payload = ProtocolPayload::PayoutTxPublished { payout_tx };
    let inbound = trade_message(TEST_OFFER_ID, "uid-spoof", "mallory.onion:9999", Delivery::Direct, payload);
    assert!(node.manager.on_inbound_message(inbound).await.is_err());

    let trade = node.manager.trade_by_id(&trade_id).expect("trade");
    assert_eq!(trade.state, TradeState::PaymentStarted);
    assert!(trade.error_message.is_some());
    let sent = node.transport.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].peer, PeerAddress::from("mallory.onion:9999"));
    assert!(matches!(&sent[0].message, PeerMessage::Ack(ack) if !ack.success));
}

#[tokio::test]
async fn test_startup_when_stale_offer_funding_found_then_swept_except_open_offers() {
    let builder = TradeBuilder::default().id("offer-in-trade").state(TradeState::DepositPublished);
    let mut node = single_pending(builder, TEST_MAKER_ADDRESS);
    node.manager.add_open_offer(OpenOffer::new(OfferBuilder::default().id("offer-open").build())).expect("open offer");
    for (offer_id, address) in [("offer-open", "funding-open"), ("offer-stale", "funding-stale"), ("offer-empty", "funding-empty")] {
        node.wallet.add_entry(AddressEntry::owned(WalletAddress::from(address), TradeId::from(offer_id), AddressContext::OfferFunding));
    }
    node.wallet.set_balance(&WalletAddress::from("funding-open"), 10_000);
    node.wallet.set_balance(&WalletAddress::from("funding-stale"), 10_000);

    node.manager.on_all_services_initialized().await.expect("init");

    assert!(node.wallet.entry_for(&TradeId::from("offer-open"), AddressContext::OfferFunding).is_some());
    assert!(node.wallet.entry_for(&TradeId::from("offer-stale"), AddressContext::OfferFunding).is_none());
    assert!(node.wallet.entry_for(&TradeId::from("offer-empty"), AddressContext::OfferFunding).is_some(), "unfunded entries stay");
}

#[tokio::test]
async fn test_period_update_when_half_deadline_passed_then_observer_notified_once() {
    let builder = TradeBuilder::default().state(TradeState::DepositConfirmed).deadlines(1_000, 2_000);
    let mut node = single_pending(builder, TEST_MAKER_ADDRESS);
    let trade_id = TradeId::from(TEST_OFFER_ID);

    node.manager.update_trade_period_states(1_500).expect("tick");
    node.manager.update_trade_period_states(1_600).expect("tick");
    node.manager.update_trade_period_states(2_500).expect("tick");
    node.manager.update_trade_period_states(1_500).expect("late tick");

    let periods: Vec<ObservedEvent> =
        node.observer.events().into_iter().filter(|event| matches!(event, ObservedEvent::Period(..))).collect();
    assert_eq!(
        periods,
        vec![
            ObservedEvent::Period(trade_id.clone(), TradePeriodState::SecondHalf),
            ObservedEvent::Period(trade_id.clone(), TradePeriodState::Overdue),
        ]
    );
    assert_eq!(node.persisted(RegistryKind::Pending)[0].period_state, TradePeriodState::Overdue);
}
