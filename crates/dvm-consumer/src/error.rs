//! Same closed error taxonomy C8 reports through (spec.md §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("config error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("cipher error: {0}")]
    Cipher(String),

    #[error("payment error: {0}")]
    Payment(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ConsumerError>;

impl From<nostr::nip90::CodecError> for ConsumerError {
    fn from(error: nostr::nip90::CodecError) -> Self {
        match error {
            nostr::nip90::CodecError::Cipher(inner) => ConsumerError::Cipher(inner.to_string()),
            other => ConsumerError::Protocol(other.to_string()),
        }
    }
}

impl From<nostr_client::ClientError> for ConsumerError {
    fn from(error: nostr_client::ClientError) -> Self {
        ConsumerError::Transport(error.to_string())
    }
}

impl From<openagents_spark::SparkError> for ConsumerError {
    fn from(error: openagents_spark::SparkError) -> Self {
        ConsumerError::Payment(error.to_string())
    }
}

impl From<anyhow::Error> for ConsumerError {
    fn from(error: anyhow::Error) -> Self {
        ConsumerError::Internal(error.to_string())
    }
}
