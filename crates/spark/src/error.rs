//! Lightning wallet adapter error taxonomy.
//!
//! Mirrors the closed error-kind set every other component in this workspace
//! reports through: `Config`, `Connection`/`Network`/`Auth` for transport and
//! credentials, `Transaction`/`LnurlError` for payment-level failures,
//! `Validation` for caller mistakes caught before any I/O, and `Internal` for
//! invariant violations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SparkError {
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("wallet initialization failed: {0}")]
    InitializationFailed(String),

    #[error("unsupported network: {0:?}")]
    UnsupportedNetwork(crate::wallet::Network),

    #[error("config error: {0}")]
    Config(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("lnurl error: {0}")]
    LnurlError(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("invalid payment request: {0}")]
    InvalidPaymentRequest(String),

    #[error("wallet operation failed: {0}")]
    Wallet(String),
}

pub type Result<T> = std::result::Result<T, SparkError>;
