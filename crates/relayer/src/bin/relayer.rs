//! Relayer binary.

use clap::Parser;
use eyre::Result;

use rofl_relayer::{Relayer, RelayerConfig};

#[derive(Parser, Debug)]
#[command(name = "rofl-relayer")]
#[command(about = "Relays source-chain ping events to a target chain with receipt proofs")]
struct Args {
    /// Sign and broadcast locally instead of delegating to the enclave
    /// signer daemon.
    #[arg(long)]
    local: bool,

    /// Log level override: DEBUG, INFO, WARNING, ERROR or CRITICAL.
    /// Defaults to the LOG_LEVEL environment variable, then INFO.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = args
        .log_level
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| "INFO".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("rofl_relayer={}", directive(&level)).parse()?),
        )
        .init();

    tracing::info!(
        mode = if args.local { "local" } else { "enclave" },
        "starting rofl-relayer"
    );

    let config = match RelayerConfig::from_env(args.local) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "configuration error");
            tracing::error!("required environment variables:");
            tracing::error!("  SOURCE_RPC_URL         source chain RPC endpoint");
            tracing::error!("  TARGET_RPC_URL         target chain RPC endpoint");
            tracing::error!("  PING_SENDER_ADDRESS    PingSender contract on the source chain");
            tracing::error!("  PING_RECEIVER_ADDRESS  PingReceiver contract on the target chain");
            tracing::error!("  ROFL_ADAPTER_ADDRESS   ROFLAdapter contract on the target chain");
            if args.local {
                tracing::error!("  LOCAL_PRIVATE_KEY      signing key for the target chain");
            }
            std::process::exit(1);
        }
    };
    config.log_config();

    let relayer = Relayer::new(config)?;
    relayer.run().await?;
    Ok(())
}

/// Maps the configured level name onto a tracing directive.
fn directive(level: &str) -> &'static str {
    match level.to_ascii_uppercase().as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" | "WARN" => "warn",
        "ERROR" => "error",
        "CRITICAL" => "error",
        other => {
            eprintln!("unknown log level `{other}`, defaulting to info");
            "info"
        }
    }
}
