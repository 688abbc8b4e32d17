//! Minimal DVM helpers built on relay pool transport.

use crate::error::{ClientError, Result};
use crate::pool::RelayPool;
use crate::relay::PublishConfirmation;
use nostr::Event;
use std::sync::Arc;

/// Lightweight DVM helper for publishing and subscribing to NIP-90 job events.
pub struct DvmClient {
    pool: Arc<RelayPool>,
}

impl DvmClient {
    /// Create a new DVM client from a relay pool.
    pub fn new(pool: Arc<RelayPool>) -> Self {
        Self { pool }
    }

    /// Publish a NIP-90 job request event. Fails unless at least one relay
    /// acknowledges the event with `OK true`.
    pub async fn publish_job_request(&self, event: &Event) -> Result<Vec<PublishConfirmation>> {
        if !nostr::nip90::is_job_request_kind(event.kind) {
            return Err(ClientError::InvalidRequest(format!(
                "expected NIP-90 request kind, got {}",
                event.kind
            )));
        }
        publish_requiring_one_ack(&self.pool, event).await
    }

    /// Publish a NIP-90 job result event. Fails unless at least one relay
    /// acknowledges the event with `OK true`.
    pub async fn publish_job_result(&self, event: &Event) -> Result<Vec<PublishConfirmation>> {
        if !nostr::nip90::is_job_result_kind(event.kind) {
            return Err(ClientError::InvalidRequest(format!(
                "expected NIP-90 result kind, got {}",
                event.kind
            )));
        }
        publish_requiring_one_ack(&self.pool, event).await
    }

    /// Publish a NIP-90 job feedback event (kind 7000). Fails unless at least
    /// one relay acknowledges the event with `OK true`.
    pub async fn publish_job_feedback(&self, event: &Event) -> Result<Vec<PublishConfirmation>> {
        if event.kind != nostr::nip90::KIND_JOB_FEEDBACK {
            return Err(ClientError::InvalidRequest(format!(
                "expected job feedback kind 7000, got {}",
                event.kind
            )));
        }
        publish_requiring_one_ack(&self.pool, event).await
    }

    /// Subscribe for feedback and result events referencing a specific
    /// request id. `result_kind` is the expected result kind
    /// (`request_kind + 1000`); both that kind and job feedback (7000) are
    /// included in the filter so a consumer observes the full lifecycle.
    pub async fn subscribe_results_for_request(
        &self,
        subscription_id: impl Into<String>,
        request_event_id: &str,
        result_kind: u16,
    ) -> Result<()> {
        self.pool
            .subscribe_filters(
                subscription_id.into(),
                vec![serde_json::json!({
                    "kinds": [result_kind, nostr::nip90::KIND_JOB_FEEDBACK],
                    "#e": [request_event_id]
                })],
            )
            .await
    }
}

async fn publish_requiring_one_ack(
    pool: &Arc<RelayPool>,
    event: &Event,
) -> Result<Vec<PublishConfirmation>> {
    let confirmations = pool.publish(event).await?;
    if confirmations.iter().any(|c| c.accepted) {
        Ok(confirmations)
    } else {
        Err(ClientError::RelayError(format!(
            "no relay accepted event {}: {:?}",
            event.id,
            confirmations
                .iter()
                .map(|c| format!("{}: {}", c.relay_url, c.message))
                .collect::<Vec<_>>()
        )))
    }
}
