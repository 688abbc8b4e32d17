//! NIP-04 direct-message encryption: ECDH (X-coordinate only) + AES-256-CBC
//! with PKCS7 padding, encoded as `base64(ciphertext)?iv=base64(iv)`.

use aes::Aes256;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use secp256k1::{PublicKey, Secp256k1, SecretKey, XOnlyPublicKey};
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

#[derive(Debug, Error)]
pub enum Nip04Error {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("malformed token: missing `?iv=` separator")]
    MalformedToken,
    #[error("invalid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("invalid iv length: expected 16 bytes, got {0}")]
    InvalidIvLength(usize),
    #[error("decryption failed: padding or ciphertext invalid")]
    DecryptionFailed,
}

pub type Result<T> = std::result::Result<T, Nip04Error>;

/// Derive the raw X-coordinate ECDH shared secret between our private key and
/// their x-only (32-byte) Nostr public key. Per NIP-04 this is used directly
/// as the AES-256 key, with no additional hashing (unlike NIP-44).
fn shared_secret(our_private_key: &[u8; 32], their_pubkey_hex: &str) -> Result<[u8; 32]> {
    let secret_key =
        SecretKey::from_slice(our_private_key).map_err(|_| Nip04Error::InvalidPrivateKey)?;
    let their_pubkey_bytes = hex::decode(their_pubkey_hex)?;
    let xonly = XOnlyPublicKey::from_slice(&their_pubkey_bytes)
        .map_err(|_| Nip04Error::InvalidPublicKey)?;
    let (full_pubkey, _parity) = xonly.public_key(secp256k1::Parity::Even);
    let point = secp256k1::ecdh::shared_secret_point(&full_pubkey, &secret_key);
    let mut key = [0u8; 32];
    key.copy_from_slice(&point[..32]);
    Ok(key)
}

/// Encrypt `plaintext` for `their_pubkey_hex` using our private key, returning
/// the `base64(ciphertext)?iv=base64(iv)` token format.
pub fn encrypt(our_private_key: &[u8; 32], their_pubkey_hex: &str, plaintext: &str) -> Result<String> {
    let key = shared_secret(our_private_key, their_pubkey_hex)?;
    let mut iv = [0u8; 16];
    rand::rng().fill_bytes(&mut iv);

    let encryptor = Aes256CbcEnc::new(&key.into(), &iv.into());
    let ciphertext = encryptor.encrypt_padded_vec_mut::<cbc::cipher::block_padding::Pkcs7>(plaintext.as_bytes());

    Ok(format!(
        "{}?iv={}",
        BASE64.encode(ciphertext),
        BASE64.encode(iv)
    ))
}

/// Decrypt a `base64(ciphertext)?iv=base64(iv)` token from `their_pubkey_hex`
/// using our private key.
pub fn decrypt(our_private_key: &[u8; 32], their_pubkey_hex: &str, token: &str) -> Result<String> {
    let (ciphertext_b64, iv_b64) = token.split_once("?iv=").ok_or(Nip04Error::MalformedToken)?;
    let ciphertext = BASE64.decode(ciphertext_b64)?;
    let iv_bytes = BASE64.decode(iv_b64)?;
    if iv_bytes.len() != 16 {
        return Err(Nip04Error::InvalidIvLength(iv_bytes.len()));
    }
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&iv_bytes);

    let key = shared_secret(our_private_key, their_pubkey_hex)?;
    let decryptor = Aes256CbcDec::new(&key.into(), &iv.into());
    let plaintext = decryptor
        .decrypt_padded_vec_mut::<cbc::cipher::block_padding::Pkcs7>(&ciphertext)
        .map_err(|_| Nip04Error::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| Nip04Error::DecryptionFailed)
}

#[allow(dead_code)]
fn x_only_from_secret(secret_key: &SecretKey) -> XOnlyPublicKey {
    let secp = Secp256k1::new();
    let public_key = PublicKey::from_secret_key(&secp, secret_key);
    let (xonly, _) = public_key.x_only_public_key();
    xonly
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pubkey_hex_for(secret: &[u8; 32]) -> String {
        let secret_key = SecretKey::from_slice(secret).expect("valid secret");
        hex::encode(x_only_from_secret(&secret_key).serialize())
    }

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let alice_sk = [1u8; 32];
        let bob_sk = [2u8; 32];
        let bob_pk_hex = pubkey_hex_for(&bob_sk);
        let alice_pk_hex = pubkey_hex_for(&alice_sk);

        let token = encrypt(&alice_sk, &bob_pk_hex, "hello bob").expect("encrypt");
        assert!(token.contains("?iv="));

        let decrypted = decrypt(&bob_sk, &alice_pk_hex, &token).expect("decrypt");
        assert_eq!(decrypted, "hello bob");
    }

    #[test]
    fn malformed_token_is_rejected() {
        let sk = [3u8; 32];
        let pk_hex = pubkey_hex_for(&[4u8; 32]);
        assert!(matches!(
            decrypt(&sk, &pk_hex, "not-a-token"),
            Err(Nip04Error::MalformedToken)
        ));
    }

    quickcheck::quickcheck! {
        fn prop_round_trips_for_any_plaintext(plaintext: String) -> bool {
            let alice_sk = [5u8; 32];
            let bob_sk = [6u8; 32];
            let bob_pk_hex = pubkey_hex_for(&bob_sk);
            let alice_pk_hex = pubkey_hex_for(&alice_sk);
            match encrypt(&alice_sk, &bob_pk_hex, &plaintext) {
                Ok(token) => decrypt(&bob_sk, &alice_pk_hex, &token).as_deref() == Ok(plaintext.as_str()),
                Err(_) => false,
            }
        }
    }
}
