//! Consumer engine (C9): ephemeral per-instance identity, job submission,
//! and the feedback/result reply stream (spec.md §4.8).

use std::sync::Arc;
use std::sync::Mutex as SyncMutex;

use nostr::nip90::{
    JOB_RESULT_KIND_MIN, JobInput, ParsedJobMessage, build_request_event, get_result_kind,
    parse_message,
};
use nostr::{Event, decode_nip19, generate_identity, Nip19Kind};
use nostr_client::{DvmClient, RelayPool, Subscription};
use openagents_spark::{SparkSigner, SparkWallet, WalletBalance, WalletConfig};
use openagents_telemetry::TelemetrySink;
use serde_json::json;
use tokio::sync::mpsc;

use crate::error::ConsumerError;

/// Kind this engine submits requests as. The contract only names text
/// generation (kind 5050); other request kinds are out of scope for C9.
const TEXT_GENERATION_KIND: u16 = 5050;

/// Wallet account index the consumer derives from, distinct from the
/// provider's default account 0 so the two never alias a wallet
/// (spec.md §5 "Isolation").
const CONSUMER_WALLET_ACCOUNT: u32 = 1;

/// A message surfaced to the caller of [`ConsumerEngine::send_message`]: a
/// status update (feedback) or the final assistant reply (result).
#[derive(Debug, Clone)]
pub enum ConsumerMessage {
    System {
        status: String,
        detail: Option<String>,
    },
    Assistant {
        content: String,
        amount_msats: Option<u64>,
        bolt11: Option<String>,
    },
}

pub struct ConsumerEngine {
    mnemonic: String,
    npub: String,
    nsec: String,
    public_key_hex: String,
    private_key: [u8; 32],
    pool: Arc<RelayPool>,
    dvm: DvmClient,
    wallet: Arc<SparkWallet>,
    default_relays: Vec<String>,
    telemetry: Arc<dyn TelemetrySink>,
    active_subscriptions: SyncMutex<Vec<String>>,
}

impl ConsumerEngine {
    /// Generates a fresh mnemonic, derives a Nostr identity (C2) and a
    /// Lightning wallet scoped to [`CONSUMER_WALLET_ACCOUNT`] (C6), and
    /// connects the relay pool to `default_relays`.
    pub async fn new(
        pool: Arc<RelayPool>,
        wallet_config: WalletConfig,
        default_relays: Vec<String>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self, ConsumerError> {
        let identity = generate_identity()?;
        let private_key_bytes = hex::decode(&identity.private_key_hex)
            .map_err(|error| ConsumerError::Internal(format!("invalid derived key hex: {error}")))?;
        let mut private_key = [0u8; 32];
        private_key.copy_from_slice(&private_key_bytes);

        let signer = SparkSigner::from_mnemonic_with_account(
            &identity.mnemonic,
            "",
            CONSUMER_WALLET_ACCOUNT,
        )?;
        let mut scoped_wallet_config = wallet_config;
        scoped_wallet_config.account_index = CONSUMER_WALLET_ACCOUNT;
        let wallet = SparkWallet::new(signer, scoped_wallet_config).await?;

        for relay in &default_relays {
            pool.add_relay(relay).await?;
        }
        pool.connect_all().await?;

        let dvm = DvmClient::new(Arc::clone(&pool));

        Ok(Self {
            mnemonic: identity.mnemonic,
            npub: identity.npub,
            nsec: identity.nsec,
            public_key_hex: identity.public_key_hex,
            private_key,
            pool,
            dvm,
            wallet: Arc::new(wallet),
            default_relays,
            telemetry,
            active_subscriptions: SyncMutex::new(Vec::new()),
        })
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn npub(&self) -> &str {
        &self.npub
    }

    pub fn nsec(&self) -> &str {
        &self.nsec
    }

    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }

    pub async fn deposit_address(&self) -> Result<String, ConsumerError> {
        Ok(self.wallet.single_use_deposit_address().await?)
    }

    pub async fn balance(&self) -> Result<WalletBalance, ConsumerError> {
        Ok(self.wallet.balance().await?)
    }

    /// Sends a text-generation request and returns a channel that yields
    /// feedback then a single result message, closing its subscription
    /// once the result arrives (spec.md §4.8).
    pub async fn send_message(
        &self,
        text: &str,
        target_provider: Option<&str>,
    ) -> Result<mpsc::Receiver<ConsumerMessage>, ConsumerError> {
        let target_pubkey_hex = resolve_target(target_provider)?;

        let event = build_request_event(
            &self.private_key,
            target_pubkey_hex.as_deref(),
            vec![JobInput::text(text)],
            None,
            None,
            TEXT_GENERATION_KIND,
            vec![],
        )?;
        self.dvm.publish_job_request(&event).await?;

        let result_kind =
            get_result_kind(TEXT_GENERATION_KIND).unwrap_or(JOB_RESULT_KIND_MIN);
        let mut filter = json!({
            "kinds": [result_kind, 7000],
            "#e": [event.id.clone()],
        });
        if let Some(target) = &target_pubkey_hex {
            filter["authors"] = json!([target]);
        }

        let subscription_id = format!("dvm-consumer-{}", event.id);
        let (subscription, mut event_rx) =
            Subscription::with_channel(subscription_id.clone(), vec![filter]);
        self.pool.subscribe(subscription).await?;
        self.active_subscriptions
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(subscription_id.clone());

        let (message_tx, message_rx) = mpsc::channel(16);
        let pool = Arc::clone(&self.pool);
        let private_key = self.private_key;
        let telemetry = Arc::clone(&self.telemetry);

        tokio::spawn(async move {
            while let Some(incoming) = event_rx.recv().await {
                match handle_incoming(&incoming, &private_key) {
                    Ok(ConsumerEvent::Message(message)) => {
                        if message_tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Ok(ConsumerEvent::Terminal(message)) => {
                        let _ = message_tx.send(message).await;
                        break;
                    }
                    Err(error) => {
                        telemetry.track_simple("consumer", "reply_parse_failed");
                        tracing::warn!("failed to parse DVM reply: {error}");
                    }
                }
            }
            let _ = pool.unsubscribe(&subscription_id).await;
        });

        Ok(message_rx)
    }

    /// Closes every subscription this instance has opened. Idempotent.
    pub async fn close(&self) -> Result<(), ConsumerError> {
        let ids: Vec<String> = {
            let mut guard = self
                .active_subscriptions
                .lock()
                .unwrap_or_else(|poison| poison.into_inner());
            std::mem::take(&mut *guard)
        };
        for id in ids {
            self.pool.unsubscribe(&id).await?;
        }
        Ok(())
    }
}

enum ConsumerEvent {
    Message(ConsumerMessage),
    Terminal(ConsumerMessage),
}

fn handle_incoming(event: &Event, private_key: &[u8; 32]) -> Result<ConsumerEvent, ConsumerError> {
    match parse_message(event, Some(private_key))? {
        ParsedJobMessage::Feedback { feedback, .. } => Ok(ConsumerEvent::Message(ConsumerMessage::System {
            status: feedback.status.as_str().to_string(),
            detail: feedback.status_extra,
        })),
        ParsedJobMessage::Result { result, .. } => Ok(ConsumerEvent::Terminal(ConsumerMessage::Assistant {
            content: result.content,
            amount_msats: result.amount,
            bolt11: result.bolt11,
        })),
    }
}

/// Resolves a `target_provider` argument per spec.md §4.8: bech32 `npub`
/// decodes to hex, a bare hex string passes through, and an empty/absent
/// target means broadcast unencrypted.
fn resolve_target(target_provider: Option<&str>) -> Result<Option<String>, ConsumerError> {
    let Some(target) = target_provider else {
        return Ok(None);
    };
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if trimmed.starts_with("npub1") {
        let (kind, data) = decode_nip19(trimmed)
            .map_err(|error| ConsumerError::Validation(format!("invalid npub: {error}")))?;
        if kind != Nip19Kind::Npub {
            return Err(ConsumerError::Validation(
                "target_provider bech32 string is not an npub".to_string(),
            ));
        }
        return Ok(Some(hex::encode(data)));
    }

    if trimmed.len() == 64 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Ok(Some(trimmed.to_ascii_lowercase()));
    }

    Err(ConsumerError::Validation(format!(
        "target_provider is neither an npub nor a 64-char hex pubkey: {target}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_target_treats_empty_as_broadcast() {
        assert_eq!(resolve_target(None).unwrap(), None);
        assert_eq!(resolve_target(Some("")).unwrap(), None);
        assert_eq!(resolve_target(Some("   ")).unwrap(), None);
    }

    #[test]
    fn resolve_target_passes_through_hex() {
        let hex_pubkey = "a".repeat(64);
        assert_eq!(
            resolve_target(Some(&hex_pubkey)).unwrap(),
            Some(hex_pubkey)
        );
    }

    #[test]
    fn resolve_target_rejects_garbage() {
        assert!(resolve_target(Some("not-a-valid-target")).is_err());
    }
}
