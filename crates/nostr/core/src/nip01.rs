//! The base Nostr event (NIP-01): canonical serialization, id computation,
//! and Schnorr signing/verification.

use std::time::{SystemTime, UNIX_EPOCH};

use bitcoin::secp256k1::{self, Keypair as SecpKeypair, Message, Secp256k1, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised while building, signing, or verifying a Nostr event.
#[derive(Debug, Error)]
pub enum Nip01Error {
    #[error("invalid hex in event field: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("invalid secret key")]
    InvalidSecretKey,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("event id does not match computed id")]
    IdMismatch,
    #[error("signature does not verify for this event")]
    VerificationFailed,
    #[error("system clock is before the unix epoch")]
    ClockBeforeEpoch,
}

pub type Result<T> = std::result::Result<T, Nip01Error>;

/// An unsigned event, ready to be hashed and signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTemplate {
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub created_at: u64,
}

/// A fully signed Nostr event, as sent over the relay wire protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

/// Seconds since the Unix epoch, as used for `created_at`.
pub fn unix_now_secs() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| Nip01Error::ClockBeforeEpoch)
}

/// Canonical serialization used for id computation: `[0, pubkey, created_at, kind, tags, content]`.
fn canonical_json(pubkey_hex: &str, template: &EventTemplate) -> String {
    let value = serde_json::json!([
        0,
        pubkey_hex,
        template.created_at,
        template.kind,
        template.tags,
        template.content,
    ]);
    value.to_string()
}

/// Compute the sha256 id of an unsigned event for a given public key.
pub fn compute_id(pubkey_hex: &str, template: &EventTemplate) -> String {
    let serialized = canonical_json(pubkey_hex, template);
    let digest = Sha256::digest(serialized.as_bytes());
    hex::encode(digest)
}

/// Sign an `EventTemplate` with a 32-byte secret key, producing a fully formed `Event`.
pub fn sign_event(template: EventTemplate, secret_key: &[u8; 32]) -> Result<Event> {
    let secp = Secp256k1::new();
    let keypair =
        SecpKeypair::from_seckey_slice(&secp, secret_key).map_err(|_| Nip01Error::InvalidSecretKey)?;
    let (xonly, _parity) = XOnlyPublicKey::from_keypair(&keypair);
    let pubkey_hex = hex::encode(xonly.serialize());

    let id_hex = compute_id(&pubkey_hex, &template);
    let id_bytes = hex::decode(&id_hex)?;
    let message = Message::from_digest_slice(&id_bytes).map_err(|_| Nip01Error::InvalidSignature)?;

    let sig = secp.sign_schnorr(&message, &keypair);

    Ok(Event {
        id: id_hex,
        pubkey: pubkey_hex,
        created_at: template.created_at,
        kind: template.kind,
        tags: template.tags,
        content: template.content,
        sig: hex::encode(sig.as_ref()),
    })
}

/// Verify that an event's id matches its content and that its signature verifies.
pub fn verify_event(event: &Event) -> Result<()> {
    let template = EventTemplate {
        kind: event.kind,
        tags: event.tags.clone(),
        content: event.content.clone(),
        created_at: event.created_at,
    };
    let expected_id = compute_id(&event.pubkey, &template);
    if expected_id != event.id {
        return Err(Nip01Error::IdMismatch);
    }

    let secp = Secp256k1::verification_only();
    let pubkey_bytes = hex::decode(&event.pubkey)?;
    let xonly =
        XOnlyPublicKey::from_slice(&pubkey_bytes).map_err(|_| Nip01Error::InvalidPublicKey)?;

    let sig_bytes = hex::decode(&event.sig)?;
    let sig = secp256k1::schnorr::Signature::from_slice(&sig_bytes)
        .map_err(|_| Nip01Error::InvalidSignature)?;

    let id_bytes = hex::decode(&event.id)?;
    let message = Message::from_digest_slice(&id_bytes).map_err(|_| Nip01Error::InvalidSignature)?;

    secp.verify_schnorr(&sig, &message, &xonly)
        .map_err(|_| Nip01Error::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let secret_key = [7u8; 32];
        let template = EventTemplate {
            kind: 1,
            tags: vec![],
            content: "hello nostr".to_string(),
            created_at: 1_700_000_000,
        };
        let event = sign_event(template, &secret_key).expect("sign");
        verify_event(&event).expect("verify");
    }

    #[test]
    fn tampered_content_fails_verification() {
        let secret_key = [9u8; 32];
        let template = EventTemplate {
            kind: 1,
            tags: vec![],
            content: "original".to_string(),
            created_at: 1_700_000_000,
        };
        let mut event = sign_event(template, &secret_key).expect("sign");
        event.content = "tampered".to_string();
        assert!(verify_event(&event).is_err());
    }

    #[test]
    fn canonical_json_matches_nip01_shape() {
        let template = EventTemplate {
            kind: 1,
            tags: vec![vec!["e".to_string(), "abc".to_string()]],
            content: "hi".to_string(),
            created_at: 5,
        };
        let json = canonical_json("deadbeef", &template);
        assert_eq!(json, r#"[0,"deadbeef",5,1,[["e","abc"]],"hi"]"#);
    }

    quickcheck::quickcheck! {
        fn prop_sign_verify_round_trips(content: String, created_at: u64) -> bool {
            let secret_key = [3u8; 32];
            let template = EventTemplate { kind: 1, tags: vec![], content, created_at };
            match sign_event(template, &secret_key) {
                Ok(event) => verify_event(&event).is_ok(),
                Err(_) => false,
            }
        }
    }
}
