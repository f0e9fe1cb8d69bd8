use crate::fixtures::TradeBuilder;
use trade_core::domain::trade::period::{advance, deadlines};
use trade_core::domain::{TradePeriodState, TradeState};

fn next_u64(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    *state
}

#[test]
fn test_period_deadlines_when_start_near_max_then_saturate() {
    assert_eq!(deadlines(1_000, 400), (1_200, 1_400));
    assert_eq!(deadlines(u64::MAX - 10, 400), (u64::MAX, u64::MAX));
}

#[test]
fn test_period_ratchet_when_ticks_arrive_out_of_order_then_never_regresses() {
    for seed in 0u64..64 {
        let mut rng = seed ^ 0xA5A5_5A5A;
        let mut trade = TradeBuilder::default().state(TradeState::DepositPublished).deadlines(1_000, 2_000).build();
        let mut highest = TradePeriodState::Normal;

        for _ in 0..100 {
            let now = next_u64(&mut rng) % 3_000;
            trade.update_period_state(now);
            assert!(trade.period_state >= highest, "seed={seed} now={now} regressed to {:?}", trade.period_state);
            highest = trade.period_state;
            assert_eq!(trade.period_state, advance(trade.period_state, now, 1_000, 2_000));
        }
    }
}

#[test]
fn test_period_update_when_payout_published_then_frozen() {
    let mut trade = TradeBuilder::default().state(TradeState::PayoutPublished).deadlines(10, 20).build();
    assert_eq!(trade.update_period_state(1_000), None);
    assert_eq!(trade.period_state, TradePeriodState::Normal);
}
