//! CLI front-end for the NIP-90 DVM runtime: start/stop the provider engine,
//! inspect its mode, and drive the consumer engine to send a job.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dvm_consumer::ConsumerMessage;
use openagents_dvm_runtime::RuntimeConfig;
use openagents_spark::{Network, WalletConfig};

const ENV_SETTINGS_PATH: &str = "PYLON_DVM_SETTINGS_PATH";
const ENV_WALLET_MNEMONIC: &str = "PYLON_DVM_WALLET_MNEMONIC";
const ENV_LLM_BASE_URL: &str = "PYLON_DVM_LLM_BASE_URL";
const ENV_CONSUMER_RELAYS: &str = "PYLON_DVM_CONSUMER_RELAYS";
const DEFAULT_LLM_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_CONSUMER_RELAY: &str = "wss://nexus.openagents.com";

#[derive(Parser)]
#[command(name = "pylon-dvm")]
#[command(about = "Run and drive the NIP-90 DVM provider/consumer runtime")]
struct PylonDvmCli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the provider engine and run until interrupted (Ctrl+C).
    Start,
    /// Start then immediately stop the provider engine, reporting counters.
    Stop,
    /// Bootstrap the runtime and report its mode and any blockers.
    Status,
    /// Send a text-generation job through the consumer engine.
    Send {
        /// The prompt text to send.
        text: String,
        /// Target provider as an npub or 64-char hex pubkey. Omit to broadcast.
        #[arg(long)]
        target: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = PylonDvmCli::parse();
    match cli.command {
        Commands::Start => run_start().await,
        Commands::Stop => run_stop().await,
        Commands::Status => run_status().await,
        Commands::Send { text, target } => run_send(&text, target.as_deref()).await,
    }
}

fn runtime_config() -> RuntimeConfig {
    let settings_path = std::env::var(ENV_SETTINGS_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_settings_path());
    let wallet_mnemonic = std::env::var(ENV_WALLET_MNEMONIC).unwrap_or_default();
    let llm_base_url =
        std::env::var(ENV_LLM_BASE_URL).unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.to_string());
    let consumer_default_relays = std::env::var(ENV_CONSUMER_RELAYS)
        .ok()
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|relay| !relay.is_empty())
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|relays| !relays.is_empty())
        .unwrap_or_else(|| vec![DEFAULT_CONSUMER_RELAY.to_string()]);

    RuntimeConfig {
        provider_settings_path: settings_path,
        provider_wallet_config: WalletConfig {
            network: Network::Regtest,
            ..WalletConfig::default()
        },
        provider_wallet_mnemonic: wallet_mnemonic,
        provider_wallet_passphrase: String::new(),
        consumer_wallet_config: WalletConfig {
            network: Network::Regtest,
            ..WalletConfig::default()
        },
        llm_base_url,
        consumer_default_relays,
    }
}

fn default_settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".pylon-dvm").join("settings.toml")
}

async fn run_start() -> anyhow::Result<()> {
    let runtime = openagents_dvm_runtime::init(runtime_config()).await;
    println!("runtime level: {:?}", runtime.level);

    let provider = match runtime.provider() {
        Ok(provider) => provider,
        Err(error) => {
            println!("provider engine unavailable: {error}");
            for blocker in runtime.provider_blockers() {
                println!("  blocker: {} ({})", blocker.code(), blocker.detail());
            }
            return Ok(());
        }
    };

    provider.start().await?;
    println!("provider started, mode={}", runtime.provider_mode().label());
    println!("press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    provider.stop().await?;
    println!(
        "provider stopped (start_count={}, stop_count={})",
        provider.start_count(),
        provider.stop_count()
    );
    Ok(())
}

async fn run_stop() -> anyhow::Result<()> {
    let runtime = openagents_dvm_runtime::init(runtime_config()).await;
    let provider = runtime.provider()?;
    provider.start().await?;
    provider.stop().await?;
    println!(
        "provider smoke-tested (start_count={}, stop_count={})",
        provider.start_count(),
        provider.stop_count()
    );
    Ok(())
}

async fn run_status() -> anyhow::Result<()> {
    let runtime = openagents_dvm_runtime::init(runtime_config()).await;
    println!("runtime level: {:?}", runtime.level);
    println!("provider mode: {}", runtime.provider_mode().label());
    let blockers = runtime.provider_blockers();
    if blockers.is_empty() {
        println!("no blockers");
    } else {
        for blocker in blockers {
            println!("blocker: {} ({})", blocker.code(), blocker.detail());
        }
    }
    Ok(())
}

async fn run_send(text: &str, target: Option<&str>) -> anyhow::Result<()> {
    let runtime = openagents_dvm_runtime::init(runtime_config()).await;
    let consumer = runtime.consumer()?;

    println!("consumer npub: {}", consumer.npub());
    let mut replies = consumer.send_message(text, target).await?;

    let timeout = Duration::from_secs(65);
    loop {
        match tokio::time::timeout(timeout, replies.recv()).await {
            Ok(Some(ConsumerMessage::System { status, detail })) => {
                println!("[{status}] {}", detail.unwrap_or_default());
            }
            Ok(Some(ConsumerMessage::Assistant {
                content,
                amount_msats,
                bolt11,
            })) => {
                println!("{content}");
                if let Some(amount) = amount_msats {
                    println!("amount_msats={amount}");
                }
                if let Some(bolt11) = bolt11 {
                    println!("bolt11={bolt11}");
                }
                break;
            }
            Ok(None) => break,
            Err(_) => {
                println!("timed out waiting for a reply");
                break;
            }
        }
    }

    consumer.close().await?;
    Ok(())
}
