//! Runtime composition (C10): staged async bootstrap of the full service
//! graph, with a process-wide accessor that fails until initialization
//! completes (spec.md §4.9).

mod config;
mod error;
mod graph;
mod mode;

pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError};
pub use graph::{GraphLevel, ServiceGraph};
pub use mode::{ProviderBlocker, ProviderMode};

use std::sync::Arc;

use tokio::sync::OnceCell;

static RUNTIME: OnceCell<Arc<ServiceGraph>> = OnceCell::const_new();

/// Runs the staged bootstrap and publishes the resulting graph as the
/// process-wide runtime. Idempotent: a second call while one is already
/// initialized returns the existing graph without re-running bootstrap.
pub async fn init(config: RuntimeConfig) -> Arc<ServiceGraph> {
    Arc::clone(
        RUNTIME
            .get_or_init(|| async move { graph::bootstrap(config).await })
            .await,
    )
}

/// Returns the current runtime, or `NotInitialized` if [`init`] has not yet
/// completed. Collaborators that need the runtime must await [`init`]
/// first; this accessor never blocks waiting for it.
pub fn current() -> Result<Arc<ServiceGraph>> {
    RUNTIME.get().cloned().ok_or(RuntimeError::NotInitialized)
}
