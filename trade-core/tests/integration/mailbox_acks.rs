use crate::fixtures::{wait_for_trade, TestNode, TradeBuilder, TEST_MAKER_ADDRESS, TEST_OFFER_ID, TEST_TAKER_ADDRESS};
use std::sync::Arc;
use std::time::Duration;
use trade_core::application::spawn_trade_loop;
use trade_core::domain::{RegistryKind, TradeState};
use trade_core::foundation::{MessageUid, PeerAddress, TradeId};
use trade_core::infrastructure::transport::{
    AckMessage, AckSourceType, Delivery, InboundMessage, MailboxEntry, MockHub, PeerMessage, TransportEvent,
};

fn ack(trade_id: &str, uid: &str, source_type: AckSourceType, delivery: Delivery) -> InboundMessage {
    let sender = PeerAddress::from(TEST_TAKER_ADDRESS);
    InboundMessage {
        delivery,
        sender_address: sender.clone(),
        message: PeerMessage::Ack(AckMessage {
            uid: MessageUid::from(uid),
            sender_address: sender,
            source_type,
            source_uid: MessageUid::from(format!("{uid}-source")),
            trade_id: TradeId::from(trade_id),
            success: true,
            error_message: None,
        }),
    }
}

fn entry(uid: &str) -> MailboxEntry {
    MailboxEntry { uid: MessageUid::from(uid), sender_address: PeerAddress::from(TEST_TAKER_ADDRESS) }
}

#[tokio::test]
async fn test_trade_message_ack_when_trade_unknown_or_closed_then_mailbox_entry_removed() {
    let closed = TradeBuilder::default().id("offer-closed").state(TradeState::WithdrawCompleted).build();
    let mut node = TestNode::with_persisted(Arc::new(MockHub::new()), TEST_MAKER_ADDRESS, &[(RegistryKind::Closed, vec![closed])]);

    node.manager.on_inbound_message(ack("offer-unknown", "uid-ack-1", AckSourceType::TradeMessage, Delivery::Mailbox)).await.expect("ack");
    node.manager.on_inbound_message(ack("offer-closed", "uid-ack-2", AckSourceType::TradeMessage, Delivery::Mailbox)).await.expect("ack");

    assert_eq!(node.transport.removed_mailbox_entries().await, vec![entry("uid-ack-1"), entry("uid-ack-2")]);
    assert!(node.transport.sent().await.is_empty(), "acks are never acknowledged");
}

#[tokio::test]
async fn test_ack_when_source_not_trade_message_then_mailbox_entry_kept() {
    let mut node = TestNode::new(Arc::new(MockHub::new()), TEST_MAKER_ADDRESS);

    node.manager.on_inbound_message(ack(TEST_OFFER_ID, "uid-offer", AckSourceType::OfferMessage, Delivery::Mailbox)).await.expect("ack");
    node.manager.on_inbound_message(ack(TEST_OFFER_ID, "uid-dispute", AckSourceType::DisputeMessage, Delivery::Mailbox)).await.expect("ack");
    node.manager.on_inbound_message(ack(TEST_OFFER_ID, "uid-direct", AckSourceType::TradeMessage, Delivery::Direct)).await.expect("ack");

    assert!(node.transport.removed_mailbox_entries().await.is_empty());
}

#[tokio::test]
async fn test_trade_loop_when_bootstrap_and_ack_injected_then_trade_initialized_and_entry_removed() {
    let persisted = TradeBuilder::default().state(TradeState::DepositConfirmed).build();
    let node = TestNode::with_persisted(Arc::new(MockHub::new()), TEST_MAKER_ADDRESS, &[(RegistryKind::Pending, vec![persisted])]);
    let transport = node.transport.clone();
    transport.set_bootstrapped(false);
    let trade_id = TradeId::from(TEST_OFFER_ID);

    let (handle, task) = spawn_trade_loop(node.manager);
    handle.on_all_services_initialized().await.expect("services");
    assert!(!handle.trade_by_id(trade_id.clone()).await.expect("query").expect("trade").initialized);

    transport.set_bootstrapped(true);
    transport.inject(TransportEvent::Bootstrapped).await;
    transport.inject(TransportEvent::Message(ack(TEST_OFFER_ID, "uid-ack", AckSourceType::TradeMessage, Delivery::Mailbox))).await;

    wait_for_trade(&handle, &trade_id, |trade| trade.initialized).await;
    let removed = async {
        loop {
            let removed = transport.removed_mailbox_entries().await;
            if !removed.is_empty() {
                return removed;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    let removed = tokio::time::timeout(Duration::from_secs(5), removed).await.expect("ack not handled in time");
    assert_eq!(removed, vec![entry("uid-ack")]);

    drop(handle);
    task.await.expect("join").expect("loop result");
}
