use trade_core::application::MessageDeduplicator;
use trade_core::foundation::{MessageUid, TradeId};

#[test]
fn test_dedup_when_capacity_exceeded_then_bounded_and_recent_kept() {
    let mut dedup = MessageDeduplicator::new(100);
    let trade = TradeId::from("offer-1");
    for n in 0..250 {
        assert!(dedup.check_and_insert(&trade, &MessageUid::from(format!("uid-{n}"))));
    }
    assert_eq!(dedup.len(), 100);
    assert!(!dedup.check_and_insert(&trade, &MessageUid::from("uid-249")));
    assert!(dedup.check_and_insert(&trade, &MessageUid::from("uid-0")));
}
