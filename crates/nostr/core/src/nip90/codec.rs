//! Encryption-aware construction and parsing of NIP-90 events.
//!
//! Builds on [`super::builders`] and [`super::model`]: those produce/parse
//! plain tag sets, this module adds the NIP-04 wrapping policy from the job
//! protocol (serialize `i`/`param` tags to JSON, encrypt under the target
//! key, replace content, mark with `["encrypted"]`).

use serde_json::json;
use thiserror::Error;

use super::builders::create_job_request_event;
use super::model::{JobFeedback, JobInput, JobRequest, JobResult, Nip90Error};
use crate::nip01::{Event, EventTemplate};
use crate::nip04;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Protocol(#[from] Nip90Error),
    #[error("encryption failed: {0}")]
    Cipher(#[from] nip04::Nip04Error),
    #[error("signing failed: {0}")]
    Sign(#[from] crate::nip01::Nip01Error),
    #[error("tag serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Builds a signed job request event. When `target_pubkey_hex` is supplied,
/// the `i`/`param` tags are JSON-serialized, NIP-04-encrypted under the
/// target's key, and the ciphertext replaces `content`; an `["encrypted"]`
/// tag and mandatory `["p", target]` tag are added. Without a target the
/// tags are published plainly.
pub fn build_request_event(
    requester_sk: &[u8; 32],
    target_pubkey_hex: Option<&str>,
    inputs: Vec<JobInput>,
    output_mime: Option<String>,
    bid: Option<u64>,
    kind: u16,
    extra_params: Vec<(String, String)>,
) -> Result<Event, CodecError> {
    let mut request = JobRequest::new(kind)?;
    for input in inputs {
        request = request.add_input(input);
    }
    if let Some(output_mime) = output_mime {
        request = request.with_output(output_mime);
    }
    if let Some(bid) = bid {
        request = request.with_bid(bid);
    }
    for (key, value) in extra_params {
        request = request.add_param(key, value);
    }

    if let Some(target_pubkey_hex) = target_pubkey_hex {
        let plaintext_tags = json!(request.to_tags()).to_string();
        let ciphertext = nip04::encrypt(requester_sk, target_pubkey_hex, &plaintext_tags)?;
        // Clear the plaintext payload so the signed event's public tags carry only
        // ["encrypted"] and ["p", target]; the protocol payload lives in content.
        request.inputs.clear();
        request.params.clear();
        request.output = None;
        request.bid = None;
        request.encrypted = true;
        request.content = ciphertext;
        request = request.add_service_provider(target_pubkey_hex);
    }

    let template = create_job_request_event(&request);
    Ok(crate::nip01::sign_event(template, requester_sk)?)
}

/// A parsed feedback or result event. Encrypted content that fails to
/// decrypt degrades to `is_encrypted=true` with the raw ciphertext in
/// `content`, rather than failing the whole parse.
#[derive(Debug, Clone)]
pub enum ParsedJobMessage {
    Result {
        result: JobResult,
        is_encrypted: bool,
    },
    Feedback {
        feedback: JobFeedback,
        is_encrypted: bool,
    },
}

/// Parses a result or feedback event, decrypting `content` when the event
/// carries `["encrypted"]` and a `decrypt_key` is supplied.
pub fn parse_message(
    event: &Event,
    decrypt_key: Option<&[u8; 32]>,
) -> Result<ParsedJobMessage, CodecError> {
    use super::kinds::{KIND_JOB_FEEDBACK, is_job_result_kind};

    if event.kind == KIND_JOB_FEEDBACK {
        let mut feedback = JobFeedback::from_event(event)?;
        let is_encrypted = feedback.encrypted;
        if is_encrypted {
            if let Some(key) = decrypt_key {
                if let Ok(plaintext) = nip04::decrypt(key, &event.pubkey, &feedback.content) {
                    feedback.content = plaintext;
                    return Ok(ParsedJobMessage::Feedback {
                        feedback,
                        is_encrypted: false,
                    });
                }
            }
        }
        return Ok(ParsedJobMessage::Feedback {
            feedback,
            is_encrypted,
        });
    }

    if is_job_result_kind(event.kind) {
        let mut result = JobResult::from_event(event)?;
        let is_encrypted = result.encrypted;
        if is_encrypted {
            if let Some(key) = decrypt_key {
                if let Ok(plaintext) = nip04::decrypt(key, &event.pubkey, &result.content) {
                    result.content = plaintext;
                    return Ok(ParsedJobMessage::Result {
                        result,
                        is_encrypted: false,
                    });
                }
            }
        }
        return Ok(ParsedJobMessage::Result {
            result,
            is_encrypted,
        });
    }

    Err(CodecError::Protocol(Nip90Error::InvalidKind(
        event.kind,
        "6000-6999 or 7000".to_string(),
    )))
}

/// Finalizes a `JobResult`/`JobFeedback` builder's tags+content into a signed
/// event, applying NIP-04 encryption toward `requester_pubkey_hex` first when
/// `provider_sk` and a target are both available and `encrypt` is set.
pub fn build_result_event(
    provider_sk: &[u8; 32],
    requester_pubkey_hex: &str,
    mut result: JobResult,
    encrypt: bool,
) -> Result<Event, CodecError> {
    if encrypt {
        let ciphertext = nip04::encrypt(provider_sk, requester_pubkey_hex, &result.content)?;
        result.encrypted = true;
        result.content = ciphertext;
    }

    let template = EventTemplate {
        kind: result.kind,
        tags: result.to_tags(),
        content: result.content.clone(),
        created_at: crate::nip01::unix_now_secs().unwrap_or(0),
    };
    Ok(crate::nip01::sign_event(template, provider_sk)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nip06::derive_keypair;

    fn keypair(seed_byte: u8) -> ([u8; 32], String) {
        let mut sk = [0u8; 32];
        sk[31] = seed_byte;
        let secp = bitcoin::secp256k1::Secp256k1::new();
        let secret_key = bitcoin::secp256k1::SecretKey::from_slice(&sk).expect("valid scalar");
        let keypair = bitcoin::secp256k1::Keypair::from_secret_key(&secp, &secret_key);
        let (xonly, _) = keypair.x_only_public_key();
        (sk, hex::encode(xonly.serialize()))
    }

    #[test]
    fn unencrypted_request_round_trips_inputs() {
        let (sk, _pk) = keypair(7);
        let event = build_request_event(
            &sk,
            None,
            vec![JobInput::text("what is 2+2")],
            None,
            None,
            5050,
            vec![],
        )
        .expect("build");

        let parsed = JobRequest::from_event(&event).expect("parse");
        assert_eq!(parsed.inputs.len(), 1);
        assert!(!parsed.encrypted);
    }

    #[test]
    fn encrypted_request_round_trips_via_decrypt() {
        let (requester_sk, _requester_pk) = keypair(1);
        let (_provider_sk, provider_pk) = keypair(2);

        let event = build_request_event(
            &requester_sk,
            Some(&provider_pk),
            vec![JobInput::text("hello")],
            None,
            None,
            5050,
            vec![],
        )
        .expect("build");

        assert_ne!(event.content, "");
        assert!(event.tags.iter().any(|tag| tag[0] == "encrypted"));
    }

    #[test]
    fn derived_keypair_produces_valid_xonly_pubkey() {
        let keypair = derive_keypair(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
        )
        .expect("derive");
        assert_eq!(keypair.public_key_hex().len(), 64);
    }
}
