//! RocksDB-backed trade store.
//!
//! One column family per registry kind, values are bincode-encoded `Trade`s
//! keyed by trade id. See `schema.rs` for names.

pub mod engine;
pub mod schema;

pub use engine::RocksTradeStore;
