use trade_core::domain::trade::role::is_buyer;
use trade_core::domain::{Capability, Position, Side, TradeRole};

#[test]
fn test_role_when_selected_from_offer_then_taker_mirrors_maker() {
    let cases = [
        (true, Position::Maker, Side::Buyer),
        (true, Position::Taker, Side::Seller),
        (false, Position::Maker, Side::Seller),
        (false, Position::Taker, Side::Buyer),
    ];
    for (offer_is_buy, position, side) in cases {
        let role = TradeRole::for_offer(offer_is_buy, position);
        assert_eq!(role.side, side, "offer_is_buy={offer_is_buy} position={position:?}");
        assert_eq!(role.is_buyer(), is_buyer(offer_is_buy, position == Position::Maker));
    }
}

#[test]
fn test_role_capabilities_when_maker_or_taker_then_disjoint() {
    assert!(TradeRole::MAKER_BUYER.can(Capability::HandleIncomingTakeRequest));
    assert!(!TradeRole::MAKER_SELLER.can(Capability::InitiateTake));
    assert!(TradeRole::TAKER_SELLER.can(Capability::InitiateTake));
    assert!(!TradeRole::TAKER_BUYER.can(Capability::HandleIncomingTakeRequest));
    assert_eq!(TradeRole::TAKER_BUYER.to_string(), "TakerBuyer");
}
