#![allow(dead_code)]

pub const TEST_OFFER_ID: &str = "offer-7f3a9c21";
pub const TEST_MAKER_ADDRESS: &str = "maker.onion:9999";
pub const TEST_TAKER_ADDRESS: &str = "taker.onion:9999";
pub const TEST_AMOUNT_SAT: u64 = 1_000_000;
pub const TEST_PRICE: u64 = 30_000;
pub const TEST_BUYER_DEPOSIT_SAT: u64 = 150_000;
pub const TEST_SELLER_DEPOSIT_SAT: u64 = 150_000;
pub const TEST_TX_FEE_SAT: u64 = 2_000;
pub const TEST_TAKER_FEE_SAT: u64 = 5_000;
pub const TEST_WITHDRAW_DESTINATION: &str = "external-wallet-1";
pub const TEST_NOW_NANOS: u64 = 1_700_000_000_000_000_000;
