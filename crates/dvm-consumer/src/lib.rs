//! DVM consumer engine (C9): ephemeral per-instance Nostr identity and
//! wallet, text-generation job submission, and the feedback/result reply
//! stream.

mod engine;
mod error;

pub use engine::{ConsumerEngine, ConsumerMessage};
pub use error::{ConsumerError, Result};
