//! NIP-19 bech32-encoded entities: `npub`, `nsec`, `note`, and the TLV-wrapped
//! `nprofile`/`nevent`/`naddr` identifiers.

use bech32::{Bech32, Hrp};
use thiserror::Error;

const NPUB_HRP: &str = "npub";
const NSEC_HRP: &str = "nsec";
const NOTE_HRP: &str = "note";
const NPROFILE_HRP: &str = "nprofile";
const NEVENT_HRP: &str = "nevent";
const NADDR_HRP: &str = "naddr";

#[derive(Debug, Error)]
pub enum Nip19Error {
    #[error("bech32 decode failed: {0}")]
    Decode(#[from] bech32::DecodeError),
    #[error("bech32 encode failed: {0}")]
    Encode(#[from] bech32::EncodeError),
    #[error("unknown human-readable prefix: {0}")]
    UnknownPrefix(String),
    #[error("expected 32 raw bytes for {0}, got {1}")]
    WrongLength(&'static str, usize),
}

pub type Result<T> = std::result::Result<T, Nip19Error>;

/// The kind of entity a bech32 string decoded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nip19Kind {
    /// A public key (`npub`) — 32 raw bytes.
    Npub,
    /// A private key (`nsec`) — 32 raw bytes.
    Nsec,
    /// An event id (`note`) — 32 raw bytes.
    Note,
    /// A TLV-wrapped profile pointer (`nprofile`) — raw TLV payload, not further parsed.
    NProfile,
    /// A TLV-wrapped event pointer (`nevent`) — raw TLV payload, not further parsed.
    NEvent,
    /// A TLV-wrapped replaceable-event address (`naddr`) — raw TLV payload, not further parsed.
    NAddr,
}

fn encode_bech32(hrp: &str, data: &[u8]) -> Result<String> {
    let parsed_hrp = Hrp::parse(hrp).map_err(|_| Nip19Error::UnknownPrefix(hrp.to_string()))?;
    Ok(bech32::encode::<Bech32>(parsed_hrp, data)?)
}

/// Encode 32 raw bytes as `npub1...`.
pub fn encode_npub(public_key: &[u8; 32]) -> Result<String> {
    encode_bech32(NPUB_HRP, public_key)
}

/// Encode 32 raw bytes as `nsec1...`.
pub fn encode_nsec(private_key: &[u8; 32]) -> Result<String> {
    encode_bech32(NSEC_HRP, private_key)
}

/// Encode a 32-byte event id as `note1...`.
pub fn encode_note(event_id: &[u8; 32]) -> Result<String> {
    encode_bech32(NOTE_HRP, event_id)
}

/// Decode any NIP-19 bech32 string into its kind and raw payload bytes.
///
/// `npub`/`nsec`/`note` payloads are exactly 32 bytes. `nprofile`/`nevent`/`naddr`
/// payloads are the raw TLV-encoded bytes (not unpacked into their constituent
/// fields, since the job protocol this crate serves never emits them).
pub fn decode(input: &str) -> Result<(Nip19Kind, Vec<u8>)> {
    let (hrp, data) = bech32::decode(input)?;
    let hrp_str = hrp.as_str();

    let kind = match hrp_str {
        NPUB_HRP => Nip19Kind::Npub,
        NSEC_HRP => Nip19Kind::Nsec,
        NOTE_HRP => Nip19Kind::Note,
        NPROFILE_HRP => Nip19Kind::NProfile,
        NEVENT_HRP => Nip19Kind::NEvent,
        NADDR_HRP => Nip19Kind::NAddr,
        other => return Err(Nip19Error::UnknownPrefix(other.to_string())),
    };

    if matches!(kind, Nip19Kind::Npub | Nip19Kind::Nsec | Nip19Kind::Note) && data.len() != 32 {
        let name = match kind {
            Nip19Kind::Npub => "npub",
            Nip19Kind::Nsec => "nsec",
            Nip19Kind::Note => "note",
            _ => unreachable!(),
        };
        return Err(Nip19Error::WrongLength(name, data.len()));
    }

    Ok((kind, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npub_round_trips() {
        let raw = [0x17u8; 32];
        let encoded = encode_npub(&raw).expect("encode");
        assert!(encoded.starts_with("npub1"));
        let (kind, data) = decode(&encoded).expect("decode");
        assert_eq!(kind, Nip19Kind::Npub);
        assert_eq!(data, raw.to_vec());
    }

    #[test]
    fn nsec_round_trips() {
        let raw = [0x7fu8; 32];
        let encoded = encode_nsec(&raw).expect("encode");
        let (kind, data) = decode(&encoded).expect("decode");
        assert_eq!(kind, Nip19Kind::Nsec);
        assert_eq!(data, raw.to_vec());
    }

    #[test]
    fn note_round_trips() {
        let raw = [0xabu8; 32];
        let encoded = encode_note(&raw).expect("encode");
        let (kind, data) = decode(&encoded).expect("decode");
        assert_eq!(kind, Nip19Kind::Note);
        assert_eq!(data, raw.to_vec());
    }

    #[test]
    fn unknown_prefix_is_rejected() {
        let encoded = encode_bech32("nfoo", &[1u8; 32]).expect("encode");
        assert!(matches!(decode(&encoded), Err(Nip19Error::UnknownPrefix(_))));
    }

    #[test]
    fn known_nip06_npub_vector_decodes() {
        let (kind, data) =
            decode("npub1zutzeysacnf9rru6zqwmxd54mud0k44tst6l70ja5mhv8jjumytsd2x7nu").expect("decode");
        assert_eq!(kind, Nip19Kind::Npub);
        assert_eq!(
            hex::encode(data),
            "17162c921dc4d2518f9a101db33695df1afb56ab82f5ff3e5da6eec3ca5cd917"
        );
    }

    quickcheck::quickcheck! {
        fn prop_npub_round_trips(raw: Vec<u8>) -> bool {
            let mut bytes = [0u8; 32];
            let n = raw.len().min(32);
            bytes[..n].copy_from_slice(&raw[..n]);
            match encode_npub(&bytes) {
                Ok(encoded) => matches!(decode(&encoded), Ok((Nip19Kind::Npub, data)) if data == bytes.to_vec()),
                Err(_) => false,
            }
        }
    }
}
