use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime has not finished initializing")]
    NotInitialized,

    #[error("service unavailable: {0}")]
    ServiceUnavailable(&'static str),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
