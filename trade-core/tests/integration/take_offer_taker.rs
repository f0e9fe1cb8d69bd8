use crate::fixtures::{take_offer_params, ObservedEvent, OfferBuilder, TestNode, TEST_MAKER_ADDRESS, TEST_TAKER_ADDRESS};
use std::sync::Arc;
use trade_core::domain::{AddressContext, RegistryKind, TradeRole, TradeState};
use trade_core::foundation::{PeerAddress, TradeError};
use trade_core::infrastructure::transport::{Delivery, MockHub, OfferAvailability, PeerMessage};

fn taker() -> TestNode {
    TestNode::new(Arc::new(MockHub::new()), TEST_TAKER_ADDRESS)
}

#[tokio::test]
async fn test_take_offer_when_handshake_succeeds_then_request_sent_to_maker() {
    let mut node = taker();
    let offer = OfferBuilder::default().build();

    let trade = node.manager.take_offer(take_offer_params(&offer)).await.expect("take offer");

    assert_eq!(trade.id, offer.id);
    assert_eq!(trade.role, TradeRole::TAKER_BUYER);
    assert_eq!(trade.state, TradeState::TakeOfferRequestSent);
    assert_eq!(trade.peer_address, PeerAddress::from(TEST_MAKER_ADDRESS));
    assert!(node.manager.was_offer_already_used_in_trade(&offer.id));

    let sent = node.transport.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].delivery, Delivery::Direct);
    assert_eq!(sent[0].peer, PeerAddress::from(TEST_MAKER_ADDRESS));
    match &sent[0].message {
        PeerMessage::TakeOfferRequest(request) => {
            assert_eq!(request.trade_id, offer.id);
            assert_eq!(request.sender_address, PeerAddress::from(TEST_TAKER_ADDRESS));
            assert_eq!(Some(&request.uid), trade.process_model.take_offer_uid.as_ref());
        }
        other => panic!("expected TakeOfferRequest, got {:?}", other),
    }

    let multisig = node.wallet.entry_for(&offer.id, AddressContext::MultiSig).expect("multisig reserved");
    assert_eq!(trade.process_model.my_multisig_address, Some(multisig.address));
    assert!(node.wallet.entry_for(&offer.id, AddressContext::TradePayout).is_some());
    assert_eq!(node.persisted(RegistryKind::Pending)[0].state, TradeState::TakeOfferRequestSent);
}

#[tokio::test]
async fn test_take_offer_when_backlog_at_limit_then_allowed_above_limit_then_refused() {
    let mut node = taker();
    node.wallet.set_unconfirmed_tx_count(21);

    let err = node.manager.take_offer(take_offer_params(&OfferBuilder::default().build())).await.expect_err("backlog");
    assert!(matches!(err, TradeError::ResourceLimit { unconfirmed: 21, limit: 20 }));
    assert_eq!(node.manager.pending_trade_count(), 0);
    assert!(node.transport.sent().await.is_empty());

    node.wallet.set_unconfirmed_tx_count(20);
    node.manager.take_offer(take_offer_params(&OfferBuilder::default().build())).await.expect("at limit");
}

#[tokio::test]
async fn test_take_offer_when_offer_already_used_then_rejected() {
    let mut node = taker();
    let offer = OfferBuilder::default().build();
    node.manager.take_offer(take_offer_params(&offer)).await.expect("first take");

    let err = node.manager.take_offer(take_offer_params(&offer)).await.expect_err("second take");
    assert!(matches!(err, TradeError::OfferAlreadyUsed(ref id) if id == offer.id.as_str()));
    assert_eq!(node.transport.sent().await.len(), 1);
}

#[tokio::test]
async fn test_take_offer_when_maker_reports_unavailable_then_nothing_reserved() {
    let mut node = taker();
    let offer = OfferBuilder::default().build();
    node.transport.set_offer_availability(offer.id.clone(), OfferAvailability::Unavailable("offer removed".to_string())).await;

    let availability = node.manager.check_offer_availability(&offer).await.expect("availability");
    assert_eq!(availability, OfferAvailability::Unavailable("offer removed".to_string()));

    let err = node.manager.take_offer(take_offer_params(&offer)).await.expect_err("unavailable");
    assert!(matches!(err, TradeError::OfferUnavailable { ref reason, .. } if reason == "offer removed"));
    assert!(node.wallet.entry_for(&offer.id, AddressContext::MultiSig).is_none());
    assert_eq!(node.manager.pending_trade_count(), 0);
}

#[tokio::test]
async fn test_take_offer_when_maker_unreachable_then_trade_reverted_and_addresses_released() {
    let mut node = taker();
    node.transport.set_fail_direct(true);
    let offer = OfferBuilder::default().build();

    let err = node.manager.take_offer(take_offer_params(&offer)).await.expect_err("send fails");
    assert!(matches!(err, TradeError::TransportError { .. }));

    assert!(!node.manager.was_offer_already_used_in_trade(&offer.id));
    assert!(node.wallet.entry_for(&offer.id, AddressContext::MultiSig).is_none());
    assert!(node.wallet.entry_for(&offer.id, AddressContext::TradePayout).is_none());
    assert_eq!(node.wallet.available_count(), 2);
    assert!(node.persisted(RegistryKind::Pending).is_empty());
    assert_eq!(node.observer.count(|event| matches!(event, ObservedEvent::Removed(id, None) if *id == offer.id)), 1);

    node.transport.set_fail_direct(false);
    node.manager.take_offer(take_offer_params(&offer)).await.expect("retry after revert");
    assert_eq!(node.wallet.available_count(), 0, "retry reuses the released addresses");
}
