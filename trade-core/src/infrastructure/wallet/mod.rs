#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockWallet;
pub use traits::*;
