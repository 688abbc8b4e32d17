//! Nostr protocol primitives for the DVM compute marketplace: identity and key
//! derivation (NIP-06), event signing (NIP-01), encrypted direct messages
//! (NIP-04), bech32 entities (NIP-19), and the job-protocol codec (NIP-90).

mod identity;
mod nip01;
mod nip04;
mod nip06;
mod nip19;
pub mod nip90;

pub use identity::{
    ENV_IDENTITY_MNEMONIC_PATH, NostrIdentity, generate_identity, identity_mnemonic_path,
    load_identity_from_path, load_or_create_identity, regenerate_identity,
};
pub use nip01::{Event, EventTemplate, Nip01Error, compute_id, sign_event, unix_now_secs, verify_event};
pub use nip04::{Nip04Error, decrypt, encrypt};
pub use nip06::{Keypair, derive_keypair, derive_keypair_with_account};
pub use nip19::{Nip19Error, Nip19Kind, decode as decode_nip19, encode_note, encode_npub, encode_nsec};
