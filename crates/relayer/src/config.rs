//! Environment-driven configuration.
//!
//! Everything the relayer needs comes from environment variables, validated
//! once at startup into an immutable [`RelayerConfig`]. Validation failures
//! name the offending variable and how to fix it.

use std::time::Duration;

use alloy_primitives::Address;

use crate::error::{RelayerError, Result};

/// Recognized target network labels.
const NETWORKS: &[&str] = &["sapphire-localnet", "sapphire-testnet", "sapphire-mainnet"];

const DEFAULT_POLLING_INTERVAL_SECS: u64 = 12;
const DEFAULT_LOOKBACK_BLOCKS: u64 = 100;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_COUNT: u32 = 3;

/// Source chain: where pings are emitted.
#[derive(Debug, Clone)]
pub struct SourceChainConfig {
    pub rpc_url: String,
    pub ping_sender: Address,
}

/// Target chain: where attestations land and proofs are submitted.
#[derive(Debug, Clone)]
pub struct TargetChainConfig {
    pub rpc_url: String,
    pub ping_receiver: Address,
    pub rofl_adapter: Address,
    /// 32-byte signing secret, present only in local mode.
    pub private_key: Option<String>,
}

/// Polling and transport knobs.
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub polling_interval: Duration,
    pub lookback_blocks: u64,
    pub request_timeout: Duration,
    pub retry_count: u32,
}

#[derive(Debug, Clone)]
pub struct RelayerConfig {
    pub source_chain: SourceChainConfig,
    pub target_chain: TargetChainConfig,
    pub monitoring: MonitoringConfig,
    /// Optional target network label, informational.
    pub network: Option<String>,
    pub local_mode: bool,
}

impl RelayerConfig {
    /// Load and validate configuration from the process environment.
    pub fn from_env(local_mode: bool) -> Result<Self> {
        Self::from_lookup(local_mode, |name| std::env::var(name).ok())
    }

    /// Same as [`Self::from_env`] but with an explicit variable lookup, so
    /// tests never touch the process environment.
    pub fn from_lookup(
        local_mode: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let source_rpc_url = require(
            &lookup,
            "SOURCE_RPC_URL",
            "HTTP/WS endpoint of the source chain, e.g. https://ethereum-sepolia.publicnode.com",
        )?;
        validate_url_scheme("SOURCE_RPC_URL", &source_rpc_url)?;

        let ping_sender = require_either(
            &lookup,
            "PING_SENDER_ADDRESS",
            "SOURCE_CONTRACT_ADDRESS",
            "address of the deployed PingSender contract on the source chain",
        )?;
        let ping_sender = parse_address("PING_SENDER_ADDRESS", &ping_sender)?;

        let target_rpc_url = require(
            &lookup,
            "TARGET_RPC_URL",
            "HTTP endpoint of the target chain, e.g. https://testnet.sapphire.oasis.io",
        )?;
        validate_url_scheme("TARGET_RPC_URL", &target_rpc_url)?;

        let ping_receiver = require_either(
            &lookup,
            "PING_RECEIVER_ADDRESS",
            "CONTRACT_ADDRESS",
            "address of the deployed PingReceiver contract on the target chain",
        )?;
        let ping_receiver = parse_address("PING_RECEIVER_ADDRESS", &ping_receiver)?;

        let rofl_adapter = require(
            &lookup,
            "ROFL_ADAPTER_ADDRESS",
            "address of the ROFLAdapter contract emitting HashStored events",
        )?;
        let rofl_adapter = parse_address("ROFL_ADAPTER_ADDRESS", &rofl_adapter)?;

        let private_key = match lookup("LOCAL_PRIVATE_KEY") {
            Some(key) => Some(validate_private_key(&key)?),
            None if local_mode => {
                return Err(RelayerError::Config(
                    "LOCAL_PRIVATE_KEY is required in local mode; \
                     set it to the 32-byte hex key that signs on the target chain"
                        .into(),
                ));
            }
            None => None,
        };

        let network = match lookup("NETWORK") {
            Some(label) if NETWORKS.contains(&label.as_str()) => Some(label),
            Some(label) => {
                return Err(RelayerError::Config(format!(
                    "NETWORK must be one of {NETWORKS:?}, got `{label}`"
                )));
            }
            None => None,
        };

        let polling_interval = ranged_u64(
            &lookup,
            "POLLING_INTERVAL",
            DEFAULT_POLLING_INTERVAL_SECS,
            1,
            300,
        )?;
        let lookback_blocks =
            ranged_u64(&lookup, "LOOKBACK_BLOCKS", DEFAULT_LOOKBACK_BLOCKS, 1, 1000)?;
        let request_timeout = ranged_u64(
            &lookup,
            "REQUEST_TIMEOUT",
            DEFAULT_REQUEST_TIMEOUT_SECS,
            1,
            u64::MAX,
        )?;
        let retry_count = ranged_u64(&lookup, "RETRY_COUNT", DEFAULT_RETRY_COUNT as u64, 0, 10)?;

        Ok(Self {
            source_chain: SourceChainConfig {
                rpc_url: source_rpc_url,
                ping_sender,
            },
            target_chain: TargetChainConfig {
                rpc_url: target_rpc_url,
                ping_receiver,
                rofl_adapter,
                private_key,
            },
            monitoring: MonitoringConfig {
                polling_interval: Duration::from_secs(polling_interval),
                lookback_blocks,
                request_timeout: Duration::from_secs(request_timeout),
                retry_count: retry_count as u32,
            },
            network,
            local_mode,
        })
    }

    /// Log the effective settings, secret redacted.
    pub fn log_config(&self) {
        tracing::info!(
            mode = if self.local_mode { "local" } else { "enclave" },
            network = self.network.as_deref().unwrap_or("unset"),
            source_rpc = %self.source_chain.rpc_url,
            ping_sender = %self.source_chain.ping_sender,
            target_rpc = %self.target_chain.rpc_url,
            ping_receiver = %self.target_chain.ping_receiver,
            rofl_adapter = %self.target_chain.rofl_adapter,
            private_key = if self.target_chain.private_key.is_some() { "[set]" } else { "[unset]" },
            polling_interval_secs = self.monitoring.polling_interval.as_secs(),
            lookback_blocks = self.monitoring.lookback_blocks,
            request_timeout_secs = self.monitoring.request_timeout.as_secs(),
            retry_count = self.monitoring.retry_count,
            "relayer configuration"
        );
    }
}

fn require(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    purpose: &str,
) -> Result<String> {
    lookup(name)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            RelayerError::Config(format!("{name} environment variable is required: {purpose}"))
        })
}

fn require_either(
    lookup: &impl Fn(&str) -> Option<String>,
    primary: &str,
    alias: &str,
    purpose: &str,
) -> Result<String> {
    lookup(primary)
        .or_else(|| lookup(alias))
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            RelayerError::Config(format!(
                "{primary} (or {alias}) environment variable is required: {purpose}"
            ))
        })
}

fn parse_address(name: &str, value: &str) -> Result<Address> {
    value
        .parse::<Address>()
        .map_err(|err| RelayerError::Config(format!("{name} is not a valid address: {err}")))
}

fn validate_url_scheme(name: &str, url: &str) -> Result<()> {
    let scheme = url.split("://").next().unwrap_or_default();
    if matches!(scheme, "http" | "https" | "ws" | "wss") {
        Ok(())
    } else {
        Err(RelayerError::Config(format!(
            "{name} must use an http, https, ws or wss URL, got `{url}`"
        )))
    }
}

/// Accepts a 32-byte hex secret with optional `0x` prefix; returns it in
/// canonical `0x`-prefixed lowercase form.
fn validate_private_key(key: &str) -> Result<String> {
    let raw = const_hex::decode(key.trim_start_matches("0x")).map_err(|err| {
        RelayerError::Config(format!("LOCAL_PRIVATE_KEY is not valid hex: {err}"))
    })?;
    if raw.len() != 32 {
        return Err(RelayerError::Config(format!(
            "LOCAL_PRIVATE_KEY must be 32 bytes, got {}",
            raw.len()
        )));
    }
    Ok(format!("0x{}", const_hex::encode(raw)))
}

fn ranged_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    min: u64,
    max: u64,
) -> Result<u64> {
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    let value = raw
        .parse::<u64>()
        .map_err(|err| RelayerError::Config(format!("{name} must be an integer: {err}")))?;
    if value < min || value > max {
        return Err(RelayerError::Config(format!(
            "{name} must be in [{min}, {max}], got {value}"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SOURCE_RPC_URL", "https://ethereum-sepolia.publicnode.com"),
            (
                "PING_SENDER_ADDRESS",
                "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed",
            ),
            ("TARGET_RPC_URL", "https://testnet.sapphire.oasis.io"),
            (
                "PING_RECEIVER_ADDRESS",
                "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359",
            ),
            (
                "ROFL_ADAPTER_ADDRESS",
                "0xdbf03b407c01e7cd3cbea99509d93f8dddc8c6fb",
            ),
        ])
    }

    fn load(env: &HashMap<&str, &str>, local: bool) -> Result<RelayerConfig> {
        RelayerConfig::from_lookup(local, |name| env.get(name).map(|v| (*v).to_string()))
    }

    #[test]
    fn defaults_applied() {
        let config = load(&base_env(), false).unwrap();
        assert_eq!(config.monitoring.polling_interval, Duration::from_secs(12));
        assert_eq!(config.monitoring.lookback_blocks, 100);
        assert_eq!(config.monitoring.retry_count, 3);
        assert!(config.target_chain.private_key.is_none());
    }

    #[test]
    fn missing_variable_is_named() {
        let mut env = base_env();
        env.remove("ROFL_ADAPTER_ADDRESS");
        let err = load(&env, false).unwrap_err();
        assert!(err.to_string().contains("ROFL_ADAPTER_ADDRESS"));
    }

    #[test]
    fn address_alias_accepted() {
        let mut env = base_env();
        let sender = env.remove("PING_SENDER_ADDRESS").unwrap();
        env.insert("SOURCE_CONTRACT_ADDRESS", sender);
        let config = load(&env, false).unwrap();
        assert_eq!(
            config.source_chain.ping_sender,
            "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"
                .parse::<Address>()
                .unwrap()
        );
    }

    #[test]
    fn addresses_normalized_to_checksum_display() {
        let config = load(&base_env(), false).unwrap();
        assert_eq!(
            config.source_chain.ping_sender.to_string(),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
    }

    #[test]
    fn local_mode_requires_key() {
        let err = load(&base_env(), true).unwrap_err();
        assert!(err.to_string().contains("LOCAL_PRIVATE_KEY"));

        let mut env = base_env();
        env.insert(
            "LOCAL_PRIVATE_KEY",
            "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
        );
        let config = load(&env, true).unwrap();
        assert!(
            config
                .target_chain
                .private_key
                .as_deref()
                .unwrap()
                .starts_with("0x4c0883a6")
        );
    }

    #[test]
    fn short_private_key_rejected() {
        let mut env = base_env();
        env.insert("LOCAL_PRIVATE_KEY", "0xdeadbeef");
        let err = load(&env, true).unwrap_err();
        assert!(err.to_string().contains("32 bytes"));
    }

    #[test]
    fn url_scheme_checked() {
        let mut env = base_env();
        env.insert("SOURCE_RPC_URL", "ftp://example.com");
        assert!(load(&env, false).is_err());

        env.insert("SOURCE_RPC_URL", "wss://example.com");
        assert!(load(&env, false).is_ok());
    }

    #[test]
    fn ranges_enforced() {
        let mut env = base_env();
        env.insert("POLLING_INTERVAL", "301");
        assert!(load(&env, false).is_err());

        let mut env = base_env();
        env.insert("LOOKBACK_BLOCKS", "0");
        assert!(load(&env, false).is_err());

        let mut env = base_env();
        env.insert("RETRY_COUNT", "10");
        assert_eq!(load(&env, false).unwrap().monitoring.retry_count, 10);
    }

    #[test]
    fn network_label_validated() {
        let mut env = base_env();
        env.insert("NETWORK", "sapphire-testnet");
        assert_eq!(
            load(&env, false).unwrap().network.as_deref(),
            Some("sapphire-testnet")
        );

        env.insert("NETWORK", "mainnet");
        assert!(load(&env, false).is_err());
    }
}
