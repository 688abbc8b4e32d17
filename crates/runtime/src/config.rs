//! Inputs the staged bootstrap needs to attempt the full service graph.

use std::path::PathBuf;

use openagents_spark::WalletConfig;

/// Everything [`crate::graph::bootstrap`] needs to attempt a full service
/// graph. None of these fields are themselves validated here — validation
/// happens where each component already validates itself
/// (`EffectiveConfig::validate_for_start`, `WalletConfig` construction).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Path to the provider's persisted settings file (C11).
    pub provider_settings_path: PathBuf,
    /// Wallet configuration the provider's `SparkWallet` is built from.
    pub provider_wallet_config: WalletConfig,
    /// Mnemonic the provider's wallet signer derives from. Distinct from
    /// `dvm_private_key_hex` in the persisted settings, which is the raw
    /// Nostr signing key rather than a wallet seed.
    pub provider_wallet_mnemonic: String,
    pub provider_wallet_passphrase: String,
    /// Wallet configuration the consumer's `SparkWallet` is built from. Its
    /// `account_index` is overridden by the consumer engine regardless of
    /// what is set here, so the two engines never alias a wallet.
    pub consumer_wallet_config: WalletConfig,
    /// Base URL the shared LLM client targets (OpenAI/Ollama-compatible).
    pub llm_base_url: String,
    /// Relays the consumer engine connects to by default.
    pub consumer_default_relays: Vec<String>,
}
