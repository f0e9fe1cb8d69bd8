//! System-wide constants for the trade lifecycle controller.

/// Nanoseconds per second (10^9).
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Env override for the wall clock, used by tests that need deterministic deadlines.
pub const TEST_NOW_NANOS_ENV_VAR: &str = "TRADE_CORE_TEST_NOW_NANOS";

/// Unconfirmed wallet transactions tolerated before new trades are refused.
pub const DEFAULT_MAX_UNCONFIRMED_TXS: u32 = 20;

/// Default maximum trade period (4 days).
///
/// Half of it marks the `SecondHalf` period, all of it marks `Overdue`.
pub const DEFAULT_MAX_TRADE_PERIOD_SECS: u64 = 4 * 24 * 60 * 60;

/// Period watcher tick (minute granularity).
pub const DEFAULT_PERIOD_CHECK_INTERVAL_SECS: u64 = 60;

/// Number of (trade id, message uid) pairs remembered for duplicate suppression.
pub const DEFAULT_DEDUP_CAPACITY: usize = 10_000;

/// Buffer of the command channel between handles and the trade loop.
pub const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Maximum length accepted for a trade id on the wire.
pub const MAX_TRADE_ID_LENGTH: usize = 256;

/// Lock time (in blocks) applied to delayed payout transactions.
pub const DELAYED_PAYOUT_LOCK_BLOCKS: u32 = 20 * 144;
