use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use breez_sdk_spark::{
    BreezSdk, GetInfoRequest, GetPaymentRequest, ListPaymentsRequest, Network as SdkNetwork,
    PaymentStatus as SdkPaymentStatus, PaymentType, PrepareSendPaymentRequest,
    ReceivePaymentMethod, ReceivePaymentRequest, SdkBuilder, Seed, SendPaymentRequest,
    SyncWalletRequest, default_config,
};

use crate::{SparkError, SparkSigner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Signet,
    Regtest,
}

impl Network {
    fn to_sdk_network(self) -> Result<SdkNetwork, SparkError> {
        match self {
            Network::Mainnet => Ok(SdkNetwork::Mainnet),
            Network::Regtest => Ok(SdkNetwork::Regtest),
            Network::Testnet | Network::Signet => Err(SparkError::UnsupportedNetwork(self)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub network: Network,
    pub api_key: Option<String>,
    pub storage_dir: PathBuf,
    /// Nostr-style account index this wallet is scoped to, so a consumer
    /// instance never aliases the provider's wallet connection or keys.
    pub account_index: u32,
    pub invoice_timeout: Duration,
    pub payment_timeout: Duration,
    pub status_timeout: Duration,
}

impl Default for WalletConfig {
    fn default() -> Self {
        let storage_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("openagents")
            .join("spark");

        Self {
            network: Network::Regtest,
            api_key: None,
            storage_dir,
            account_index: 0,
            invoice_timeout: Duration::from_secs(30),
            payment_timeout: Duration::from_secs(30),
            status_timeout: Duration::from_secs(5),
        }
    }
}

/// A token balance held alongside sats (e.g. a Spark-issued asset).
#[derive(Debug, Clone)]
pub struct TokenBalance {
    pub token_identifier: String,
    pub amount: u64,
}

/// `balance()`'s contract-level return shape: `{sats, token_balances}`.
#[derive(Debug, Clone, Default)]
pub struct WalletBalance {
    pub sats: u64,
    pub token_balances: Vec<TokenBalance>,
}

#[derive(Debug, Clone, Default)]
pub struct Balance {
    pub spark_sats: u64,
    pub lightning_sats: u64,
    pub onchain_sats: u64,
}

impl Balance {
    pub fn total_sats(&self) -> u64 {
        self.spark_sats
            .saturating_add(self.lightning_sats)
            .saturating_add(self.onchain_sats)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct NetworkStatusReport {
    pub status: NetworkStatus,
    pub detail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentSummary {
    pub id: String,
    pub direction: String,
    pub status: String,
    pub amount_sats: u64,
    pub timestamp: u64,
}

/// A freshly minted Lightning invoice.
#[derive(Debug, Clone)]
pub struct Invoice {
    pub bolt11: String,
    pub amount_sats: u64,
    pub memo: Option<String>,
    pub expiry_unix_secs: Option<u64>,
}

/// Outcome of `pay_invoice`.
#[derive(Debug, Clone)]
pub struct PaymentResult {
    pub payment_id: String,
    pub amount_sats: u64,
}

/// `check_invoice_status`'s result state. `pending`/`paid`/`expired`/`error`
/// per the wallet adapter contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceState {
    Pending,
    Paid,
    Expired,
    Error,
}

#[derive(Debug, Clone)]
pub struct InvoiceStatus {
    pub state: InvoiceState,
    pub amount_paid_sats: Option<u64>,
}

pub struct SparkWallet {
    signer: SparkSigner,
    config: WalletConfig,
    sdk: Arc<BreezSdk>,
}

impl SparkWallet {
    /// Asynchronously initialize the wallet backend. There is deliberately no
    /// synchronous constructor: the runtime bootstrap (C10) must await this
    /// and treat the window before completion as `ServiceUnavailable`.
    pub async fn new(signer: SparkSigner, config: WalletConfig) -> Result<Self, SparkError> {
        let seed = Seed::Mnemonic {
            mnemonic: signer.mnemonic().to_string(),
            passphrase: if signer.passphrase().is_empty() {
                None
            } else {
                Some(signer.passphrase().to_string())
            },
        };

        let mut sdk_config = default_config(config.network.to_sdk_network()?);
        if let Some(api_key) = &config.api_key {
            sdk_config.api_key = Some(api_key.clone());
        } else {
            sdk_config.real_time_sync_server_url = None;
        }

        let builder = SdkBuilder::new(sdk_config, seed)
            .with_default_storage(config.storage_dir.to_string_lossy().to_string());
        let sdk = builder
            .build()
            .await
            .map_err(|error| SparkError::InitializationFailed(error.to_string()))?;

        Ok(Self {
            signer,
            config,
            sdk: Arc::new(sdk),
        })
    }

    pub fn signer(&self) -> &SparkSigner {
        &self.signer
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Distinct from `check_wallet_status`: carries a detail string for
    /// degraded-mode diagnostics rather than a bare boolean.
    pub async fn network_status(&self) -> NetworkStatusReport {
        match tokio::time::timeout(
            self.config.status_timeout,
            self.sdk.sync_wallet(SyncWalletRequest {}),
        )
        .await
        {
            Ok(Ok(_)) => NetworkStatusReport {
                status: NetworkStatus::Connected,
                detail: None,
            },
            Ok(Err(error)) => NetworkStatusReport {
                status: NetworkStatus::Disconnected,
                detail: Some(error.to_string()),
            },
            Err(_) => NetworkStatusReport {
                status: NetworkStatus::Disconnected,
                detail: Some(format!(
                    "no response within {:?}",
                    self.config.status_timeout
                )),
            },
        }
    }

    /// `check_wallet_status() -> bool`.
    pub async fn check_wallet_status(&self) -> bool {
        self.network_status().await.status == NetworkStatus::Connected
    }

    pub async fn get_balance(&self) -> Result<Balance, SparkError> {
        let info = self
            .sdk
            .get_info(GetInfoRequest {
                ensure_synced: Some(true),
            })
            .await
            .map_err(|error| SparkError::Wallet(error.to_string()))?;

        Ok(Balance {
            spark_sats: info.balance_sats,
            lightning_sats: 0,
            onchain_sats: 0,
        })
    }

    /// `balance() -> {sats, token_balances}`.
    pub async fn balance(&self) -> Result<WalletBalance, SparkError> {
        let balance = self.get_balance().await?;
        Ok(WalletBalance {
            sats: balance.total_sats(),
            token_balances: Vec::new(),
        })
    }

    pub async fn get_spark_address(&self) -> Result<String, SparkError> {
        let response = self
            .sdk
            .receive_payment(ReceivePaymentRequest {
                payment_method: ReceivePaymentMethod::SparkAddress,
            })
            .await
            .map_err(|error| SparkError::Wallet(error.to_string()))?;
        Ok(response.payment_request)
    }

    pub async fn get_bitcoin_address(&self) -> Result<String, SparkError> {
        let response = self
            .sdk
            .receive_payment(ReceivePaymentRequest {
                payment_method: ReceivePaymentMethod::BitcoinAddress,
            })
            .await
            .map_err(|error| SparkError::Wallet(error.to_string()))?;
        Ok(response.payment_request)
    }

    /// `single_use_deposit_address() -> string`. Each call to
    /// `receive_payment` mints a fresh on-chain address, which already
    /// satisfies single-use semantics.
    pub async fn single_use_deposit_address(&self) -> Result<String, SparkError> {
        self.get_bitcoin_address().await
    }

    /// `create_invoice({amount_sats, memo, expiry?}) -> Invoice`. Validation
    /// of `amount_sats` precedes any I/O.
    pub async fn create_invoice(
        &self,
        amount_sats: u64,
        memo: Option<String>,
        expiry_seconds: Option<u64>,
    ) -> Result<Invoice, SparkError> {
        if amount_sats == 0 {
            return Err(SparkError::Validation(
                "amount must be greater than zero".to_string(),
            ));
        }

        let expiry_time = expiry_seconds.map(|seconds| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|duration| duration.as_secs().saturating_add(seconds))
                .unwrap_or(seconds)
        });

        let response = tokio::time::timeout(
            self.config.invoice_timeout,
            self.sdk.receive_payment(ReceivePaymentRequest {
                payment_method: ReceivePaymentMethod::SparkInvoice {
                    amount: Some(u128::from(amount_sats)),
                    token_identifier: None,
                    expiry_time,
                    description: memo.clone(),
                    sender_public_key: None,
                },
            }),
        )
        .await
        .map_err(|_| {
            SparkError::Connection(format!(
                "invoice creation timed out after {:?}",
                self.config.invoice_timeout
            ))
        })?
        .map_err(|error| SparkError::Transaction(error.to_string()))?;

        Ok(Invoice {
            bolt11: response.payment_request,
            amount_sats,
            memo,
            expiry_unix_secs: expiry_time,
        })
    }

    /// `pay_invoice({bolt11, max_fee_sats?, timeout?}) -> PaymentResult`.
    pub async fn pay_invoice(
        &self,
        bolt11: &str,
        max_fee_sats: Option<u64>,
        timeout: Option<Duration>,
    ) -> Result<PaymentResult, SparkError> {
        let request = bolt11.trim();
        if request.is_empty() {
            return Err(SparkError::Validation(
                "payment request cannot be empty".to_string(),
            ));
        }

        let deadline = timeout.unwrap_or(self.config.payment_timeout);

        let prepare_response = tokio::time::timeout(
            deadline,
            self.sdk.prepare_send_payment(PrepareSendPaymentRequest {
                payment_request: request.to_string(),
                amount: None,
                token_identifier: None,
            }),
        )
        .await
        .map_err(|_| SparkError::Connection(format!("prepare_send_payment timed out after {deadline:?}")))?
        .map_err(|error| SparkError::Transaction(error.to_string()))?;

        if let Some(max_fee_sats) = max_fee_sats {
            if prepare_response.fee_sats() > max_fee_sats {
                return Err(SparkError::Validation(format!(
                    "fee {} exceeds max_fee_sats {}",
                    prepare_response.fee_sats(),
                    max_fee_sats
                )));
            }
        }

        let response = tokio::time::timeout(
            deadline,
            self.sdk.send_payment(SendPaymentRequest {
                prepare_response,
                options: None,
                idempotency_key: None,
            }),
        )
        .await
        .map_err(|_| SparkError::Connection(format!("send_payment timed out after {deadline:?}")))?
        .map_err(|error| SparkError::Transaction(error.to_string()))?;

        Ok(PaymentResult {
            payment_id: response.payment.id,
            amount_sats: u64::try_from(response.payment.amount).unwrap_or(u64::MAX),
        })
    }

    /// Back-compat helper kept from the original wallet adapter; `pay_invoice`
    /// is the contract-level entry point.
    pub async fn send_payment_simple(
        &self,
        payment_request: &str,
        amount_sats: Option<u64>,
    ) -> Result<String, SparkError> {
        let request = payment_request.trim();
        if request.is_empty() {
            return Err(SparkError::Validation(
                "payment request cannot be empty".to_string(),
            ));
        }

        let prepare_response = self
            .sdk
            .prepare_send_payment(PrepareSendPaymentRequest {
                payment_request: request.to_string(),
                amount: amount_sats.map(u128::from),
                token_identifier: None,
            })
            .await
            .map_err(|error| SparkError::Transaction(error.to_string()))?;

        let response = self
            .sdk
            .send_payment(SendPaymentRequest {
                prepare_response,
                options: None,
                idempotency_key: None,
            })
            .await
            .map_err(|error| SparkError::Transaction(error.to_string()))?;

        Ok(response.payment.id)
    }

    /// `check_invoice_status(bolt11) -> {status, amount_paid_sats?}`.
    pub async fn check_invoice_status(&self, bolt11: &str) -> Result<InvoiceStatus, SparkError> {
        match self
            .sdk
            .get_payment(GetPaymentRequest {
                payment_request: Some(bolt11.to_string()),
                ..Default::default()
            })
            .await
        {
            Ok(response) => {
                let state = match response.payment.status {
                    SdkPaymentStatus::Completed => InvoiceState::Paid,
                    SdkPaymentStatus::Pending => InvoiceState::Pending,
                    SdkPaymentStatus::Failed => InvoiceState::Expired,
                };
                let amount_paid_sats = matches!(state, InvoiceState::Paid)
                    .then(|| u64::try_from(response.payment.amount).unwrap_or(u64::MAX));
                Ok(InvoiceStatus {
                    state,
                    amount_paid_sats,
                })
            }
            Err(_) => Ok(InvoiceStatus {
                state: InvoiceState::Pending,
                amount_paid_sats: None,
            }),
        }
    }

    pub async fn list_payments(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<PaymentSummary>, SparkError> {
        let response = self
            .sdk
            .list_payments(ListPaymentsRequest {
                limit,
                offset,
                sort_ascending: Some(false),
                ..Default::default()
            })
            .await
            .map_err(|error| SparkError::Wallet(error.to_string()))?;

        let payments = response
            .payments
            .into_iter()
            .map(|payment| PaymentSummary {
                id: payment.id,
                direction: payment_direction_label(payment.payment_type).to_string(),
                status: format!("{:?}", payment.status).to_ascii_lowercase(),
                amount_sats: u64::try_from(payment.amount).unwrap_or(u64::MAX),
                timestamp: payment.timestamp,
            })
            .collect();

        Ok(payments)
    }
}

fn payment_direction_label(payment_type: PaymentType) -> &'static str {
    match payment_type {
        PaymentType::Send => "send",
        PaymentType::Receive => "receive",
    }
}

#[cfg(test)]
mod tests {
    use super::{Balance, Network, PaymentType, SdkNetwork, payment_direction_label};
    use crate::SparkError;

    #[test]
    fn network_mapping_mainnet_is_explicit() {
        assert!(matches!(
            Network::Mainnet.to_sdk_network(),
            Ok(SdkNetwork::Mainnet)
        ));
    }

    #[test]
    fn network_mapping_regtest_is_explicit() {
        assert!(matches!(
            Network::Regtest.to_sdk_network(),
            Ok(SdkNetwork::Regtest)
        ));
    }

    #[test]
    fn network_mapping_testnet_is_rejected() {
        let result = Network::Testnet.to_sdk_network();
        assert!(matches!(
            result,
            Err(SparkError::UnsupportedNetwork(Network::Testnet))
        ));
    }

    #[test]
    fn network_mapping_signet_is_rejected() {
        let result = Network::Signet.to_sdk_network();
        assert!(matches!(
            result,
            Err(SparkError::UnsupportedNetwork(Network::Signet))
        ));
    }

    #[test]
    fn balance_total_sats_is_saturating() {
        let balance = Balance {
            spark_sats: u64::MAX,
            lightning_sats: 1,
            onchain_sats: 10,
        };
        assert_eq!(balance.total_sats(), u64::MAX);
    }

    #[test]
    fn payment_direction_labels_match_payment_type() {
        assert_eq!(payment_direction_label(PaymentType::Send), "send");
        assert_eq!(payment_direction_label(PaymentType::Receive), "receive");
    }
}
