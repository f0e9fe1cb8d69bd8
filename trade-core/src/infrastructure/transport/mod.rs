pub mod encoding;
pub mod messages;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod traits;

pub use encoding::{decode_message, encode_message};
pub use messages::*;
#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockHub, MockTransport};
pub use traits::*;
