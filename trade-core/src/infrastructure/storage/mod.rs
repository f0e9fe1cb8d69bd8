#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod rocks;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryTradeStore;
pub use rocks::RocksTradeStore;
pub use traits::*;
