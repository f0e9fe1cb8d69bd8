use super::messages::PeerMessage;
use crate::foundation::TradeError;

const WIRE_PROTOCOL_VERSION_V1: u16 = 1;

/// Version-prefixed JSON frame for one peer message.
pub fn encode_message(message: &PeerMessage) -> Result<Vec<u8>, TradeError> {
    let mut out = Vec::new();
    out.extend_from_slice(&WIRE_PROTOCOL_VERSION_V1.to_le_bytes());
    let bytes = serde_json::to_vec(message).map_err(|err| crate::serde_err!("json", err))?;
    out.extend_from_slice(&bytes);
    Ok(out)
}

pub fn decode_message(bytes: &[u8]) -> Result<PeerMessage, TradeError> {
    if bytes.len() < 2 {
        return Err(TradeError::TransportError { operation: "decode_message".to_string(), details: "frame too short".to_string() });
    }
    let version = u16::from_le_bytes([bytes[0], bytes[1]]);
    if version != WIRE_PROTOCOL_VERSION_V1 {
        return Err(TradeError::TransportError {
            operation: "decode_message".to_string(),
            details: format!("wire protocol version mismatch: expected {WIRE_PROTOCOL_VERSION_V1}, got {version}"),
        });
    }
    serde_json::from_slice(&bytes[2..]).map_err(|err| crate::serde_err!("json", err))
}
