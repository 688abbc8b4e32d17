//! Provider-facing status surface (SPEC_FULL.md §11). Informational only:
//! derived from the provider engine's active flag and the graph's
//! completeness, not an independent state machine.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    Offline,
    Connecting,
    Online,
    Degraded,
}

impl ProviderMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Connecting => "connecting",
            Self::Online => "online",
            Self::Degraded => "degraded",
        }
    }
}

/// Only the two blockers that apply to this system. A teacher-derived
/// surface named two more (`SkillTrustUnavailable`, `CreditLaneUnavailable`)
/// that belong to subsystems this system does not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderBlocker {
    IdentityMissing,
    WalletError,
}

impl ProviderBlocker {
    pub const fn code(self) -> &'static str {
        match self {
            Self::IdentityMissing => "IDENTITY_MISSING",
            Self::WalletError => "WALLET_ERROR",
        }
    }

    pub const fn detail(self) -> &'static str {
        match self {
            Self::IdentityMissing => "Nostr identity (dvm_private_key_hex) is not configured",
            Self::WalletError => "Lightning wallet is not ready",
        }
    }
}
