use crate::foundation::{Hash32, TradeError};

pub fn decode_hex(s: &str) -> Result<Vec<u8>, TradeError> {
    hex::decode(s).map_err(|err| TradeError::Validation(format!("hex decode error: {err}")))
}

/// Parses a 32-byte hex value, with or without a `0x` prefix.
pub fn parse_hex_32bytes(s: &str) -> Result<Hash32, TradeError> {
    let trimmed = s.trim();
    let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = decode_hex(stripped)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| TradeError::Validation(format!("expected 32 bytes, got {}", bytes.len())))
}
