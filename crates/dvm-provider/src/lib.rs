//! DVM provider engine (C8): subscribes to NIP-90 job requests, runs each
//! through a pricing/inference/payment pipeline, and reconciles invoice
//! status in the background.

mod config;
mod engine;
mod error;
mod job_store;

pub use config::{EffectiveConfig, PersistedSettings, SettingsSnapshot, TextJobDefaults};
pub use engine::{ProviderEngine, safe_result_kind};
pub use error::{ProviderError, Result};
pub use job_store::{
    HistoryPage, HistoryQuery, InMemoryJobStore, JobRecord, JobRecordStatus, JobStatistics,
    JobStore,
};
