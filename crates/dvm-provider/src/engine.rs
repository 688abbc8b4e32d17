//! DVM provider engine (C8): `Inactive` <-> `Active` state machine, the
//! per-event job pipeline (spec.md §4.7 steps 1-11), and the payment-status
//! reconciler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use nostr::nip90::{
    InputType, JOB_RESULT_KIND_MAX, JOB_RESULT_KIND_MIN, JobFeedback, JobRequest, JobResult,
    JobStatus, KIND_JOB_FEEDBACK, build_result_event, create_job_feedback_event, get_result_kind,
    is_job_result_kind,
};
use nostr::{Event, decrypt, sign_event, unix_now_secs};
use nostr_client::{DvmClient, RelayPool, Subscription};
use openagents_llm::{ChatMessage, ChatRequest, LlmClient, estimate_tokens};
use openagents_spark::{InvoiceState, SparkWallet};
use openagents_telemetry::{Severity, TelemetryEvent, TelemetrySink, track_with_severity};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::config::{EffectiveConfig, SettingsSnapshot, TextJobDefaults};
use crate::error::ProviderError;
use crate::job_store::{JobRecord, JobRecordStatus, JobStore};

/// The running services the engine drives. Everything here is shared and
/// internally synchronized, matching spec.md §5 "shared resources."
pub struct ProviderEngine {
    pool: Arc<RelayPool>,
    dvm: DvmClient,
    llm: Arc<LlmClient>,
    wallet: Arc<SparkWallet>,
    settings: Arc<SettingsSnapshot>,
    store: Arc<dyn JobStore>,
    telemetry: Arc<dyn TelemetrySink>,
    is_active: AtomicBool,
    is_connecting: AtomicBool,
    start_count: AtomicU64,
    stop_count: AtomicU64,
    subscription_id: AsyncMutex<Option<String>>,
    reconciler_handle: AsyncMutex<Option<JoinHandle<()>>>,
}

impl ProviderEngine {
    pub fn new(
        pool: Arc<RelayPool>,
        llm: Arc<LlmClient>,
        wallet: Arc<SparkWallet>,
        settings: Arc<SettingsSnapshot>,
        store: Arc<dyn JobStore>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Arc<Self> {
        let dvm = DvmClient::new(Arc::clone(&pool));
        Arc::new(Self {
            pool,
            dvm,
            llm,
            wallet,
            settings,
            store,
            telemetry,
            is_active: AtomicBool::new(false),
            is_connecting: AtomicBool::new(false),
            start_count: AtomicU64::new(0),
            stop_count: AtomicU64::new(0),
            subscription_id: AsyncMutex::new(None),
            reconciler_handle: AsyncMutex::new(None),
        })
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    /// True from the moment `start()` begins subscribing until it either
    /// activates or fails. Lets callers surface a `Connecting` status while
    /// the relay subscription is in flight instead of a stale `Offline`.
    pub fn is_connecting(&self) -> bool {
        self.is_connecting.load(Ordering::SeqCst)
    }

    pub fn start_count(&self) -> u64 {
        self.start_count.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> u64 {
        self.stop_count.load(Ordering::SeqCst)
    }

    /// Idempotent: starting while already `Active` logs a telemetry event
    /// and returns success without resubscribing (spec.md §4.7).
    pub async fn start(self: &Arc<Self>) -> Result<(), ProviderError> {
        self.start_count.fetch_add(1, Ordering::SeqCst);
        if self.is_active.load(Ordering::SeqCst) {
            self.telemetry.track_simple("provider", "start_while_active");
            return Ok(());
        }

        self.is_connecting.store(true, Ordering::SeqCst);
        let outcome = self.connect_and_spawn().await;
        self.is_connecting.store(false, Ordering::SeqCst);
        outcome?;

        self.is_active.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Subscribes to the relay pool and spawns the event-dispatch and
    /// reconciler tasks. Kept separate from `start` so `is_connecting`
    /// brackets exactly this fallible span, success or failure.
    async fn connect_and_spawn(self: &Arc<Self>) -> Result<(), ProviderError> {
        let config = self.settings.read()?;
        config.validate_for_start()?;

        let subscription_id = format!("dvm-provider-{}", unix_now_secs().unwrap_or(0));
        let since = unix_now_secs().unwrap_or(0).saturating_sub(300);
        let filters = vec![serde_json::json!({
            "kinds": config.supported_kinds,
            "since": since,
        })];

        let (subscription, mut event_rx) = Subscription::with_channel(subscription_id.clone(), filters);
        self.pool.subscribe(subscription).await?;
        *self.subscription_id.lock().await = Some(subscription_id);

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.process_event(event).await });
            }
        });

        let reconciler = Self::spawn_reconciler(Arc::clone(self));
        *self.reconciler_handle.lock().await = Some(reconciler);
        Ok(())
    }

    /// Idempotent: stopping while already `Inactive` logs a telemetry event
    /// and returns success. In-flight job pipelines are allowed to
    /// complete; their publishes may fail and are logged, not surfaced
    /// (spec.md §5 "Cancellation").
    pub async fn stop(self: &Arc<Self>) -> Result<(), ProviderError> {
        self.stop_count.fetch_add(1, Ordering::SeqCst);
        let was_active = self.is_active.swap(false, Ordering::SeqCst);
        if !was_active {
            self.telemetry.track_simple("provider", "stop_while_inactive");
            return Ok(());
        }

        if let Some(handle) = self.reconciler_handle.lock().await.take() {
            handle.abort();
        }
        if let Some(subscription_id) = self.subscription_id.lock().await.take() {
            let _ = self.pool.unsubscribe(&subscription_id).await;
        }
        Ok(())
    }

    fn spawn_reconciler(engine: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(120));
            interval.tick().await; // first tick fires immediately; consume it
            loop {
                interval.tick().await;
                engine.run_reconciler_once().await;
            }
        })
    }

    async fn run_reconciler_once(&self) {
        for (id, bolt11) in self.store.pending_payment_ids() {
            match self.wallet.check_invoice_status(&bolt11).await {
                Ok(status) => {
                    let now = unix_now_secs().unwrap_or(0);
                    match status.state {
                        InvoiceState::Paid => {
                            self.store
                                .record_payment(id, status.amount_paid_sats.unwrap_or(0), now);
                        }
                        InvoiceState::Expired => {
                            self.store.update_status(id, JobRecordStatus::Error, now);
                        }
                        InvoiceState::Pending | InvoiceState::Error => {}
                    }
                }
                Err(error) => {
                    track_with_severity(
                        TelemetryEvent::new("reconciler", "check_invoice_failed")
                            .with_label(error.to_string()),
                        Severity::Warn,
                    );
                }
            }
        }
    }

    /// Per-event pipeline entry point. Failures after step 1 are caught
    /// here and converted into error feedback + an error job record; they
    /// never terminate the subscription loop (spec.md §7 propagation policy).
    async fn process_event(self: Arc<Self>, event: Event) {
        let config = match self.settings.read() {
            Ok(config) => config,
            Err(error) => {
                track_with_severity(
                    TelemetryEvent::new("job", "config_resolve_failed").with_label(error.to_string()),
                    Severity::Error,
                );
                return;
            }
        };

        // Step 1: drop self-authored events and result/feedback kinds.
        if is_job_result_kind(event.kind) || event.kind == KIND_JOB_FEEDBACK {
            return;
        }
        if let Some(own_pubkey) = &config.dvm_public_key_hex {
            if &event.pubkey == own_pubkey {
                return;
            }
        }

        if let Err(error) = self.run_pipeline(&config, &event).await {
            self.handle_pipeline_failure(&config, &event, error).await;
        }
    }

    async fn run_pipeline(&self, config: &EffectiveConfig, event: &Event) -> Result<(), ProviderError> {
        let private_key = config.private_key_bytes()?;
        let requester_pubkey = event.pubkey.clone();

        // Step 3: decrypt if the request carries ["encrypted"].
        let is_encrypted = event
            .tags
            .iter()
            .any(|tag| tag.first().map(String::as_str) == Some("encrypted"));

        let request = if is_encrypted {
            let plaintext = decrypt(&private_key, &requester_pubkey, &event.content)
                .map_err(|error| ProviderError::Cipher(error.to_string()))?;
            let tags: Vec<Vec<String>> = serde_json::from_str(&plaintext)
                .map_err(|error| ProviderError::Protocol(format!("invalid decrypted tag JSON: {error}")))?;
            let decrypted_event = Event { tags, ..event.clone() };
            let mut request = JobRequest::from_event(&decrypted_event)?;
            request.encrypted = true;
            request
        } else {
            JobRequest::from_event(event)?
        };

        // Step 4: require a non-empty text input.
        let text = match request
            .inputs
            .iter()
            .find(|input| input.input_type == InputType::Text && !input.data.is_empty())
        {
            Some(input) => input.data.clone(),
            None => {
                self.publish_feedback(config, event, JobStatus::Error, Some("no text input"))
                    .await?;
                self.record_error_job(event, request.kind, "no text input");
                return Ok(());
            }
        };

        // Step 5.
        self.publish_feedback(config, event, JobStatus::Processing, None).await?;

        // Step 6.
        let model = request
            .params
            .iter()
            .find(|param| param.key == "model")
            .map(|param| param.value.clone())
            .or_else(|| config.backend_preference.clone())
            .unwrap_or_else(|| config.text_job_defaults.model.clone());

        let mut chat_request = ChatRequest::new(model.clone(), vec![ChatMessage::user(text.clone())]);
        chat_request.max_tokens = Some(config.text_job_defaults.max_tokens);
        chat_request.temperature = Some(config.text_job_defaults.temperature);
        chat_request.top_k = Some(config.text_job_defaults.top_k);
        chat_request.top_p = Some(config.text_job_defaults.top_p);
        chat_request.frequency_penalty = Some(config.text_job_defaults.frequency_penalty);

        let response = self.llm.chat_completion(&chat_request).await?;

        let (prompt_tokens, completion_tokens, total_tokens) = match &response.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens, usage.total_tokens),
            None => {
                let prompt = estimate_tokens(&text);
                let completion = estimate_tokens(&response.content);
                (prompt, completion, prompt + completion)
            }
        };

        // Step 7.
        let price_sats = price_for_tokens(total_tokens, &config.text_job_defaults);

        // Step 8: mint invoice, unless payments are disabled for this config.
        let (amount_msats, bolt11) = if config.require_payment {
            let invoice = self
                .wallet
                .create_invoice(price_sats, Some(format!("dvm job {}", event.id)), None)
                .await?;
            (price_sats * 1000, Some(invoice.bolt11))
        } else {
            (0, None)
        };

        // Steps 9-10: encrypt output if needed, build + publish the result.
        let request_json = serde_json::to_string(event)
            .map_err(|error| ProviderError::Protocol(format!("failed to serialize request event: {error}")))?;
        let mut result = JobResult::new(request.kind, &event.id, &requester_pubkey, response.content.clone())?
            .with_request(request_json);
        for input in &request.inputs {
            result = result.add_input(input.clone());
        }
        if let Some(bolt11) = &bolt11 {
            result = result.with_amount(amount_msats, Some(bolt11.clone()));
        }

        let result_event = build_result_event(&private_key, &requester_pubkey, result, is_encrypted)?;
        self.dvm.publish_job_result(&result_event).await?;

        // Step 11.
        self.publish_feedback(config, event, JobStatus::Success, None).await?;

        let content_hash = hex::encode(Sha256::digest(response.content.as_bytes()));
        let now = unix_now_secs().unwrap_or(0);
        let status = if config.require_payment {
            JobRecordStatus::PendingPayment
        } else {
            JobRecordStatus::Completed
        };
        self.store.insert(JobRecord {
            id: 0,
            request_event_id: event.id.clone(),
            requester_pubkey,
            kind: request.kind,
            input_preview: preview(&text),
            status,
            invoice_bolt11: bolt11,
            invoice_amount_sats: if config.require_payment { Some(price_sats) } else { None },
            payment_hash: None,
            model_used: Some(model),
            tokens_prompt: Some(prompt_tokens),
            tokens_completion: Some(completion_tokens),
            created_at: now,
            updated_at: now,
            result_content_hash: Some(content_hash),
            error_message: None,
        });

        Ok(())
    }

    async fn publish_feedback(
        &self,
        config: &EffectiveConfig,
        event: &Event,
        status: JobStatus,
        extra: Option<&str>,
    ) -> Result<(), ProviderError> {
        let private_key = config.private_key_bytes()?;
        let mut feedback = JobFeedback::new(status, &event.id, &event.pubkey);
        if let Some(extra) = extra {
            feedback = feedback.with_status_extra(extra);
        }
        let template = create_job_feedback_event(&feedback);
        let signed = sign_event(template, &private_key)
            .map_err(|error| ProviderError::Internal(error.to_string()))?;
        self.dvm.publish_job_feedback(&signed).await?;
        Ok(())
    }

    async fn handle_pipeline_failure(&self, config: &EffectiveConfig, event: &Event, error: ProviderError) {
        track_with_severity(
            TelemetryEvent::new("job", "pipeline_failed").with_label(error.to_string()),
            Severity::Error,
        );
        if let Err(publish_error) = self
            .publish_feedback(config, event, JobStatus::Error, Some(&short_message(&error)))
            .await
        {
            tracing::warn!(
                "failed to publish error feedback for {}: {}",
                event.id,
                publish_error
            );
        }
        self.record_error_job(event, event.kind, &error.to_string());
    }

    fn record_error_job(&self, event: &Event, kind: u16, message: &str) {
        let now = unix_now_secs().unwrap_or(0);
        self.store.insert(JobRecord {
            id: 0,
            request_event_id: event.id.clone(),
            requester_pubkey: event.pubkey.clone(),
            kind,
            input_preview: String::new(),
            status: JobRecordStatus::Error,
            invoice_bolt11: None,
            invoice_amount_sats: None,
            payment_hash: None,
            model_used: None,
            tokens_prompt: None,
            tokens_completion: None,
            created_at: now,
            updated_at: now,
            result_content_hash: None,
            error_message: Some(message.to_string()),
        });
    }
}

fn price_for_tokens(total_tokens: u32, defaults: &TextJobDefaults) -> u64 {
    let computed = ((f64::from(total_tokens) / 1000.0) * defaults.price_per_1k_tokens).ceil();
    (computed as u64).max(defaults.min_price_sats)
}

fn preview(text: &str) -> String {
    const MAX_PREVIEW_CHARS: usize = 200;
    text.chars().take(MAX_PREVIEW_CHARS).collect()
}

fn short_message(error: &ProviderError) -> String {
    let full = error.to_string();
    const MAX_LEN: usize = 200;
    if full.len() > MAX_LEN {
        format!("{}...", &full[..MAX_LEN])
    } else {
        full
    }
}

/// Defensive re-implementation of the codec's result-kind tie-break
/// (spec.md §4.6). `JobRequest::from_event`/`JobResult::new` already reject
/// a malformed request kind before a result event is ever built, so this
/// path is unreachable through the pipeline above; it exists for a caller
/// that computes a result kind from a raw, unvalidated numeric kind.
pub fn safe_result_kind(request_kind: u16) -> u16 {
    match get_result_kind(request_kind) {
        Some(result_kind) => result_kind,
        None => {
            let clamped = request_kind
                .saturating_add(1000)
                .clamp(JOB_RESULT_KIND_MIN, JOB_RESULT_KIND_MAX);
            track_with_severity(
                TelemetryEvent::new("codec", "result_kind_clamped").with_label(request_kind.to_string()),
                Severity::Error,
            );
            clamped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_floors_at_minimum_for_zero_tokens() {
        let defaults = TextJobDefaults {
            min_price_sats: 10,
            price_per_1k_tokens: 2.0,
            ..TextJobDefaults::default()
        };
        assert_eq!(price_for_tokens(0, &defaults), 10);
    }

    #[test]
    fn price_rounds_up_per_thousand_tokens() {
        let defaults = TextJobDefaults {
            min_price_sats: 1,
            price_per_1k_tokens: 2.0,
            ..TextJobDefaults::default()
        };
        // 1500 tokens * 2/1000 = 3.0 exactly
        assert_eq!(price_for_tokens(1500, &defaults), 3);
        // 1001 tokens * 2/1000 = 2.002, ceils to 3
        assert_eq!(price_for_tokens(1001, &defaults), 3);
    }

    #[test]
    fn clamp_pushes_out_of_range_kind_into_result_window() {
        assert_eq!(safe_result_kind(5050), 6050);
        assert_eq!(safe_result_kind(u16::MAX), JOB_RESULT_KIND_MAX);
    }

    #[test]
    fn preview_truncates_long_text() {
        let long = "a".repeat(500);
        assert_eq!(preview(&long).len(), 200);
    }
}
