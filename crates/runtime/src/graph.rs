//! Staged async bootstrap (spec.md §4.9): try the full service graph, fall
//! back to progressively smaller ones on failure, never panic on startup.

use std::sync::Arc;

use dvm_consumer::ConsumerEngine;
use dvm_provider::{EffectiveConfig, InMemoryJobStore, JobStore, ProviderEngine, SettingsSnapshot};
use nostr_client::{PoolConfig, RelayPool};
use openagents_llm::LlmClient;
use openagents_spark::{SparkSigner, SparkWallet};
use openagents_telemetry::{Severity, TelemetryEvent, TelemetrySink, TracingTelemetrySink, track_with_severity};

use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::mode::{ProviderBlocker, ProviderMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphLevel {
    Full,
    Minimal,
    Emergency,
    Empty,
}

/// The composed set of services a runtime consumer can reach. Components
/// that failed to build at this graph's level are `None`; looking them up
/// through the accessor methods returns `ServiceUnavailable`.
pub struct ServiceGraph {
    pub level: GraphLevel,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub pool: Option<Arc<RelayPool>>,
    pub llm: Option<Arc<LlmClient>>,
    pub store: Option<Arc<dyn JobStore>>,
    pub settings: Option<Arc<SettingsSnapshot>>,
    pub provider: Option<Arc<ProviderEngine>>,
    pub consumer: Option<Arc<ConsumerEngine>>,
}

impl ServiceGraph {
    pub fn pool(&self) -> Result<Arc<RelayPool>> {
        self.pool
            .clone()
            .ok_or(RuntimeError::ServiceUnavailable("relay pool"))
    }

    pub fn llm(&self) -> Result<Arc<LlmClient>> {
        self.llm
            .clone()
            .ok_or(RuntimeError::ServiceUnavailable("llm client"))
    }

    pub fn store(&self) -> Result<Arc<dyn JobStore>> {
        self.store
            .clone()
            .ok_or(RuntimeError::ServiceUnavailable("job store"))
    }

    pub fn provider(&self) -> Result<Arc<ProviderEngine>> {
        self.provider
            .clone()
            .ok_or(RuntimeError::ServiceUnavailable("provider engine"))
    }

    pub fn consumer(&self) -> Result<Arc<ConsumerEngine>> {
        self.consumer
            .clone()
            .ok_or(RuntimeError::ServiceUnavailable("consumer engine"))
    }

    /// Informational status derived from this graph's completeness and the
    /// provider engine's own active flag, not an independent state machine.
    pub fn provider_mode(&self) -> ProviderMode {
        match self.level {
            GraphLevel::Full => match &self.provider {
                Some(provider) if provider.is_connecting() => ProviderMode::Connecting,
                Some(provider) if provider.is_active() => ProviderMode::Online,
                Some(_) => ProviderMode::Offline,
                None => ProviderMode::Degraded,
            },
            GraphLevel::Minimal => ProviderMode::Degraded,
            GraphLevel::Emergency | GraphLevel::Empty => ProviderMode::Offline,
        }
    }

    pub fn provider_blockers(&self) -> Vec<ProviderBlocker> {
        let mut blockers = Vec::new();
        if self.provider.is_none() {
            blockers.push(ProviderBlocker::IdentityMissing);
        }
        if !matches!(self.level, GraphLevel::Full) {
            blockers.push(ProviderBlocker::WalletError);
        }
        blockers
    }
}

/// Attempts the full graph; on failure logs a critical telemetry event and
/// falls back to minimal, then emergency, then an empty context. Never
/// returns an `Err` — the empty context is the floor.
pub async fn bootstrap(config: RuntimeConfig) -> Arc<ServiceGraph> {
    let telemetry: Arc<dyn TelemetrySink> = Arc::new(TracingTelemetrySink);

    match build_full(&config, Arc::clone(&telemetry)).await {
        Ok(graph) => {
            telemetry.track_simple("runtime", "bootstrap_full");
            return Arc::new(graph);
        }
        Err(error) => {
            track_with_severity(
                TelemetryEvent::new("runtime", "bootstrap_full_failed")
                    .with_label(error.to_string()),
                Severity::Error,
            );
        }
    }

    match build_minimal(&config, Arc::clone(&telemetry)) {
        Ok(graph) => {
            telemetry.track_simple("runtime", "bootstrap_minimal");
            return Arc::new(graph);
        }
        Err(error) => {
            track_with_severity(
                TelemetryEvent::new("runtime", "bootstrap_minimal_failed")
                    .with_label(error.to_string()),
                Severity::Error,
            );
        }
    }

    telemetry.track_simple("runtime", "bootstrap_emergency");
    Arc::new(ServiceGraph {
        level: GraphLevel::Emergency,
        telemetry,
        pool: None,
        llm: None,
        store: None,
        settings: None,
        provider: None,
        consumer: None,
    })
}

async fn build_full(
    config: &RuntimeConfig,
    telemetry: Arc<dyn TelemetrySink>,
) -> anyhow::Result<ServiceGraph> {
    let pool = Arc::new(RelayPool::new(PoolConfig::default()));
    let llm = Arc::new(LlmClient::new(config.llm_base_url.clone())?);
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let settings = Arc::new(SettingsSnapshot::new(config.provider_settings_path.clone()));

    let effective: EffectiveConfig = settings.read()?;
    effective.validate_for_start()?;

    let wallet_signer = SparkSigner::from_mnemonic(
        &config.provider_wallet_mnemonic,
        &config.provider_wallet_passphrase,
    )?;
    let wallet = Arc::new(SparkWallet::new(wallet_signer, config.provider_wallet_config.clone()).await?);

    let provider = ProviderEngine::new(
        Arc::clone(&pool),
        Arc::clone(&llm),
        Arc::clone(&wallet),
        Arc::clone(&settings),
        Arc::clone(&store),
        Arc::clone(&telemetry),
    );

    let consumer = ConsumerEngine::new(
        Arc::clone(&pool),
        config.consumer_wallet_config.clone(),
        config.consumer_default_relays.clone(),
        Arc::clone(&telemetry),
    )
    .await?;

    Ok(ServiceGraph {
        level: GraphLevel::Full,
        telemetry,
        pool: Some(pool),
        llm: Some(llm),
        store: Some(store),
        settings: Some(settings),
        provider: Some(provider),
        consumer: Some(Arc::new(consumer)),
    })
}

/// Only synchronously-initializable services: no wallet, no provider or
/// consumer engine (both require an async wallet construction step).
fn build_minimal(
    config: &RuntimeConfig,
    telemetry: Arc<dyn TelemetrySink>,
) -> anyhow::Result<ServiceGraph> {
    let pool = Arc::new(RelayPool::new(PoolConfig::default()));
    let llm = Arc::new(LlmClient::new(config.llm_base_url.clone())?);
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let settings = Arc::new(SettingsSnapshot::new(config.provider_settings_path.clone()));

    Ok(ServiceGraph {
        level: GraphLevel::Minimal,
        telemetry,
        pool: Some(pool),
        llm: Some(llm),
        store: Some(store),
        settings: Some(settings),
        provider: None,
        consumer: None,
    })
}
