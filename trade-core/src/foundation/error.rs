use std::io;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Validation,
    AvailabilityConflict,
    ResourceLimit,
    Funds,
    BroadcastFailure,
    InconsistentLockedFunds,
    OfferAlreadyUsed,
    OfferUnavailable,
    TradeNotFound,
    DuplicateTrade,
    AddressUnavailable,
    MissingDelayedPayoutTx,
    InvalidStateTransition,
    ProtocolViolation,
    MailboxDeliveryFailed,
    StorageError,
    SerializationError,
    ConfigError,
    TransportError,
    ChannelClosed,
    Message,
}

#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("offer {offer_id} is no longer available (state {state})")]
    AvailabilityConflict { offer_id: String, state: String },

    #[error("unconfirmed transaction limit reached: unconfirmed={unconfirmed} limit={limit}")]
    ResourceLimit { unconfirmed: u32, limit: u32 },

    #[error("funds error for trade {trade_id}: {details}")]
    Funds { trade_id: String, details: String },

    #[error("broadcast failed for trade {trade_id}: {details}")]
    BroadcastFailure { trade_id: String, details: String },

    /// A closed or failed trade still reports locked funds while its deposit is missing or unconfirmed.
    #[error("inconsistent locked funds for trade {trade_id}: {reason}")]
    InconsistentLockedFunds { trade_id: String, reason: String },

    #[error("offer already used in a trade: {0}")]
    OfferAlreadyUsed(String),

    #[error("offer {offer_id} unavailable: {reason}")]
    OfferUnavailable { offer_id: String, reason: String },

    #[error("trade not found: {0}")]
    TradeNotFound(String),

    #[error("trade {trade_id} already registered in {registry}")]
    DuplicateTrade { trade_id: String, registry: String },

    #[error("no address available for trade {trade_id} context {context}")]
    AddressUnavailable { trade_id: String, context: String },

    #[error("trade {0} has no delayed payout transaction")]
    MissingDelayedPayoutTx(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("protocol violation for trade {trade_id}: {details}")]
    ProtocolViolation { trade_id: String, details: String },

    #[error("mailbox delivery failed for trade {trade_id}: {details}")]
    MailboxDeliveryFailed { trade_id: String, details: String },

    #[error("storage error during {operation}: {details}")]
    StorageError { operation: String, details: String },

    #[error("{format} serialization error: {details}")]
    SerializationError { format: String, details: String },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("transport error during {operation}: {details}")]
    TransportError { operation: String, details: String },

    #[error("trade loop unavailable: {0}")]
    ChannelClosed(String),

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, TradeError>;

impl TradeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TradeError::Validation(_) => ErrorCode::Validation,
            TradeError::AvailabilityConflict { .. } => ErrorCode::AvailabilityConflict,
            TradeError::ResourceLimit { .. } => ErrorCode::ResourceLimit,
            TradeError::Funds { .. } => ErrorCode::Funds,
            TradeError::BroadcastFailure { .. } => ErrorCode::BroadcastFailure,
            TradeError::InconsistentLockedFunds { .. } => ErrorCode::InconsistentLockedFunds,
            TradeError::OfferAlreadyUsed(_) => ErrorCode::OfferAlreadyUsed,
            TradeError::OfferUnavailable { .. } => ErrorCode::OfferUnavailable,
            TradeError::TradeNotFound(_) => ErrorCode::TradeNotFound,
            TradeError::DuplicateTrade { .. } => ErrorCode::DuplicateTrade,
            TradeError::AddressUnavailable { .. } => ErrorCode::AddressUnavailable,
            TradeError::MissingDelayedPayoutTx(_) => ErrorCode::MissingDelayedPayoutTx,
            TradeError::InvalidStateTransition { .. } => ErrorCode::InvalidStateTransition,
            TradeError::ProtocolViolation { .. } => ErrorCode::ProtocolViolation,
            TradeError::MailboxDeliveryFailed { .. } => ErrorCode::MailboxDeliveryFailed,
            TradeError::StorageError { .. } => ErrorCode::StorageError,
            TradeError::SerializationError { .. } => ErrorCode::SerializationError,
            TradeError::ConfigError(_) => ErrorCode::ConfigError,
            TradeError::TransportError { .. } => ErrorCode::TransportError,
            TradeError::ChannelClosed(_) => ErrorCode::ChannelClosed,
            TradeError::Message(_) => ErrorCode::Message,
        }
    }

    pub fn context(&self) -> ErrorContext {
        ErrorContext { code: self.code(), message: self.to_string() }
    }

    /// Failures a caller may retry without any state having changed.
    pub fn is_retry_safe(&self) -> bool {
        matches!(
            self,
            TradeError::ResourceLimit { .. }
                | TradeError::Funds { .. }
                | TradeError::BroadcastFailure { .. }
                | TradeError::TransportError { .. }
                | TradeError::MailboxDeliveryFailed { .. }
        )
    }

    pub fn funds(trade_id: impl Into<String>, details: impl Into<String>) -> Self {
        TradeError::Funds { trade_id: trade_id.into(), details: details.into() }
    }

    pub fn broadcast_failure(trade_id: impl Into<String>, details: impl Into<String>) -> Self {
        TradeError::BroadcastFailure { trade_id: trade_id.into(), details: details.into() }
    }

    pub fn address_unavailable(trade_id: impl Into<String>, context: impl std::fmt::Display) -> Self {
        TradeError::AddressUnavailable { trade_id: trade_id.into(), context: context.to_string() }
    }

    pub fn protocol_violation(trade_id: impl Into<String>, details: impl Into<String>) -> Self {
        TradeError::ProtocolViolation { trade_id: trade_id.into(), details: details.into() }
    }
}

impl From<rocksdb::Error> for TradeError {
    fn from(err: rocksdb::Error) -> Self {
        TradeError::StorageError { operation: "rocksdb".to_string(), details: err.to_string() }
    }
}

impl From<bincode::Error> for TradeError {
    fn from(err: bincode::Error) -> Self {
        TradeError::SerializationError { format: "bincode".to_string(), details: err.to_string() }
    }
}

impl From<toml::ser::Error> for TradeError {
    fn from(err: toml::ser::Error) -> Self {
        TradeError::SerializationError { format: "toml".to_string(), details: err.to_string() }
    }
}

impl From<figment::Error> for TradeError {
    fn from(err: figment::Error) -> Self {
        TradeError::ConfigError(format!("config extraction failed: {err}"))
    }
}

impl From<io::Error> for TradeError {
    fn from(err: io::Error) -> Self {
        TradeError::StorageError { operation: "io".to_string(), details: err.to_string() }
    }
}

#[macro_export]
macro_rules! storage_err {
    ($op:expr, $err:expr) => {
        $crate::foundation::TradeError::StorageError { operation: $op.into(), details: $err.to_string() }
    };
}

#[macro_export]
macro_rules! serde_err {
    ($fmt:expr, $err:expr) => {
        $crate::foundation::TradeError::SerializationError { format: $fmt.into(), details: $err.to_string() }
    };
}

// NOTE: Avoid adding generic "stringly" error conversions here.
// Use structured `TradeError` variants at the call site to preserve context.
