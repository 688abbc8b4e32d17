//! Effective configuration (spec.md §3 "Effective configuration (DVM)",
//! §4.10 settings snapshot).
//!
//! Persisted settings are TOML-backed, following the teacher's
//! `PylonConfig::load()` pattern: a defaulted struct loaded from a single
//! file, re-read on every [`SettingsSnapshot::read`] so configuration changes
//! apply to the next job without a restart. Unknown keys in the persisted
//! file round-trip through a `serde_json::Value` overlay merged against the
//! defaults, rather than being dropped by strict struct deserialization.

use std::path::{Path, PathBuf};

use bitcoin::secp256k1::{Secp256k1, SecretKey, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;

/// Defaults applied to text-generation jobs (kind 5050 and friends) absent an
/// explicit `param` tag overriding them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextJobDefaults {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub min_price_sats: u64,
    pub price_per_1k_tokens: f64,
}

impl Default for TextJobDefaults {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            max_tokens: 2048,
            temperature: 0.7,
            top_k: 40,
            top_p: 0.9,
            frequency_penalty: 0.0,
            min_price_sats: 1,
            price_per_1k_tokens: 1.0,
        }
    }
}

/// The on-disk shape. Every field is optional-with-default so a partial or
/// empty file still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedSettings {
    pub active: bool,
    pub dvm_private_key_hex: Option<String>,
    pub relays: Vec<String>,
    pub supported_kinds: Vec<u16>,
    pub text_job_defaults: TextJobDefaults,
    pub require_payment: bool,
    pub backend_preference: Option<String>,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            active: false,
            dvm_private_key_hex: None,
            relays: Vec::new(),
            supported_kinds: Vec::new(),
            text_job_defaults: TextJobDefaults::default(),
            require_payment: true,
            backend_preference: None,
        }
    }
}

/// The merged, ready-to-use configuration a job-processing task reads at the
/// start of its pipeline (spec.md §4.7 step 2: "resolve effective config
/// fresh at the start of processing").
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub active: bool,
    pub dvm_private_key_hex: Option<String>,
    pub dvm_public_key_hex: Option<String>,
    pub relays: Vec<String>,
    pub supported_kinds: Vec<u16>,
    pub text_job_defaults: TextJobDefaults,
    pub require_payment: bool,
    pub backend_preference: Option<String>,
}

impl EffectiveConfig {
    /// Fails with `ConfigError` per spec.md §4.7 "start": private key
    /// missing, relays empty, or supported_kinds empty.
    pub fn validate_for_start(&self) -> Result<(), ProviderError> {
        if self.dvm_private_key_hex.is_none() {
            return Err(ProviderError::Config(
                "dvm_private_key_hex is not set".to_string(),
            ));
        }
        if self.relays.is_empty() {
            return Err(ProviderError::Config("relays is empty".to_string()));
        }
        if self.supported_kinds.is_empty() {
            return Err(ProviderError::Config(
                "supported_kinds is empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn private_key_bytes(&self) -> Result<[u8; 32], ProviderError> {
        let hex_str = self
            .dvm_private_key_hex
            .as_ref()
            .ok_or_else(|| ProviderError::Config("dvm_private_key_hex is not set".to_string()))?;
        let bytes = hex::decode(hex_str)
            .map_err(|error| ProviderError::Config(format!("invalid private key hex: {error}")))?;
        if bytes.len() != 32 {
            return Err(ProviderError::Config(
                "dvm_private_key_hex must decode to 32 bytes".to_string(),
            ));
        }
        let mut array = [0u8; 32];
        array.copy_from_slice(&bytes);
        Ok(array)
    }
}

/// Derives the x-only (32-byte) Nostr public key from a raw secp256k1
/// private key, matching the key material `sign_event` uses.
fn derive_public_key_hex(private_key_hex: &str) -> Result<String, ProviderError> {
    let bytes = hex::decode(private_key_hex)
        .map_err(|error| ProviderError::Config(format!("invalid private key hex: {error}")))?;
    let secret_key = SecretKey::from_slice(&bytes)
        .map_err(|_| ProviderError::Config("private key is not a valid secp256k1 scalar".to_string()))?;
    let secp = Secp256k1::new();
    let (xonly, _parity) = XOnlyPublicKey::from_keypair(&bitcoin::secp256k1::Keypair::from_secret_key(
        &secp,
        &secret_key,
    ));
    Ok(hex::encode(xonly.serialize()))
}

fn merge_json(default: Value, user: Value) -> Value {
    match (default, user) {
        (Value::Object(mut default_map), Value::Object(user_map)) => {
            for (key, user_value) in user_map {
                let merged = match default_map.remove(&key) {
                    Some(default_value) => merge_json(default_value, user_value),
                    None => user_value,
                };
                default_map.insert(key, merged);
            }
            Value::Object(default_map)
        }
        (_, user_value) => user_value,
    }
}

/// Reads and merges the persisted settings file on every call, per spec.md
/// §4.10: "merged with defaults on every read ... so changes take effect on
/// the next job without a restart."
pub struct SettingsSnapshot {
    path: PathBuf,
}

impl SettingsSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read(&self) -> Result<EffectiveConfig, ProviderError> {
        let overlay = self.load_overlay(&self.path)?;
        let settings: PersistedSettings = serde_json::from_value(overlay)
            .map_err(|error| ProviderError::Config(format!("invalid settings shape: {error}")))?;

        let dvm_public_key_hex = match settings.dvm_private_key_hex.as_deref() {
            Some(private_key_hex) => {
                let derived = derive_public_key_hex(private_key_hex)?;
                Some(derived)
            }
            None => None,
        };

        Ok(EffectiveConfig {
            active: settings.active,
            dvm_private_key_hex: settings.dvm_private_key_hex,
            dvm_public_key_hex,
            relays: settings.relays,
            supported_kinds: settings.supported_kinds,
            text_job_defaults: settings.text_job_defaults,
            require_payment: settings.require_payment,
            backend_preference: settings.backend_preference,
        })
    }

    fn load_overlay(&self, path: &Path) -> Result<Value, ProviderError> {
        let defaults = serde_json::to_value(PersistedSettings::default())
            .map_err(|error| ProviderError::Internal(error.to_string()))?;

        if !path.exists() {
            return Ok(defaults);
        }

        let text = std::fs::read_to_string(path)
            .map_err(|error| ProviderError::Config(format!("failed to read {}: {error}", path.display())))?;
        let toml_value: toml::Value = toml::from_str(&text)
            .map_err(|error| ProviderError::Config(format!("failed to parse {}: {error}", path.display())))?;
        let user_value = serde_json::to_value(toml_value)
            .map_err(|error| ProviderError::Internal(error.to_string()))?;

        Ok(merge_json(defaults, user_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let snapshot = SettingsSnapshot::new("/nonexistent/path/settings.toml");
        let config = snapshot.read().expect("read");
        assert!(!config.active);
        assert!(config.relays.is_empty());
    }

    #[test]
    fn start_validation_requires_key_relays_and_kinds() {
        let config = EffectiveConfig {
            active: false,
            dvm_private_key_hex: None,
            dvm_public_key_hex: None,
            relays: vec![],
            supported_kinds: vec![],
            text_job_defaults: TextJobDefaults::default(),
            require_payment: true,
            backend_preference: None,
        };
        assert!(matches!(
            config.validate_for_start(),
            Err(ProviderError::Config(_))
        ));
    }

    #[test]
    fn unknown_keys_survive_the_merge() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "active = true\nunknown_future_field = \"kept\"\n").expect("write");

        let snapshot = SettingsSnapshot::new(&path);
        let overlay = snapshot.load_overlay(&path).expect("overlay");
        assert_eq!(overlay["unknown_future_field"], Value::String("kept".to_string()));
        assert_eq!(overlay["active"], Value::Bool(true));
    }

    #[test]
    fn derived_pubkey_is_deterministic() {
        let private_key_hex = hex::encode([7u8; 32]);
        let a = derive_public_key_hex(&private_key_hex).expect("derive");
        let b = derive_public_key_hex(&private_key_hex).expect("derive");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
