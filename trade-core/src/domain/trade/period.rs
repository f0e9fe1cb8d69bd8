use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TradePeriodState {
    #[default]
    Normal,
    SecondHalf,
    Overdue,
}

/// Phase implied by the clock alone, without regard to the current state.
pub fn phase_at(now_nanos: u64, half_deadline_nanos: u64, max_deadline_nanos: u64) -> TradePeriodState {
    if now_nanos > max_deadline_nanos {
        TradePeriodState::Overdue
    } else if now_nanos > half_deadline_nanos {
        TradePeriodState::SecondHalf
    } else {
        TradePeriodState::Normal
    }
}

/// Returns the next period state. Never moves backwards.
pub fn advance(current: TradePeriodState, now_nanos: u64, half_deadline_nanos: u64, max_deadline_nanos: u64) -> TradePeriodState {
    current.max(phase_at(now_nanos, half_deadline_nanos, max_deadline_nanos))
}

/// Half and max deadlines for a trade period starting at `start_nanos`.
pub fn deadlines(start_nanos: u64, max_period_nanos: u64) -> (u64, u64) {
    (start_nanos.saturating_add(max_period_nanos / 2), start_nanos.saturating_add(max_period_nanos))
}
