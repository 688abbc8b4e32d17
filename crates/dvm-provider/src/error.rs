//! The closed error taxonomy every component in the marketplace reports
//! through: `Config`/`Validation` are caller-recoverable, `Transport`/
//! `Protocol`/`Cipher` describe wire-level failures, `Payment`/`Inference`
//! are job-level failures, `ServiceUnavailable` is a degraded-runtime
//! signal, and `Internal` marks an invariant violation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
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

    #[error("inference error: {0}")]
    Inference(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

impl From<nostr::nip90::Nip90Error> for ProviderError {
    fn from(error: nostr::nip90::Nip90Error) -> Self {
        ProviderError::Protocol(error.to_string())
    }
}

impl From<nostr::nip90::CodecError> for ProviderError {
    fn from(error: nostr::nip90::CodecError) -> Self {
        match error {
            nostr::nip90::CodecError::Cipher(inner) => ProviderError::Cipher(inner.to_string()),
            other => ProviderError::Protocol(other.to_string()),
        }
    }
}

impl From<nostr_client::ClientError> for ProviderError {
    fn from(error: nostr_client::ClientError) -> Self {
        ProviderError::Transport(error.to_string())
    }
}

impl From<openagents_llm::LlmError> for ProviderError {
    fn from(error: openagents_llm::LlmError) -> Self {
        ProviderError::Inference(error.to_string())
    }
}

impl From<openagents_spark::SparkError> for ProviderError {
    fn from(error: openagents_spark::SparkError) -> Self {
        ProviderError::Payment(error.to_string())
    }
}
