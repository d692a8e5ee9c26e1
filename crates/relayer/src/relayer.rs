//! Relayer orchestration and lifecycle.
//!
//! Wires the adapters and the processor, runs both polling listeners with
//! their dispatch loops plus a periodic status reporter, and shuts
//! everything down on interrupt or when a listener dies.

use std::sync::Arc;
use std::time::Duration;

use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolEvent;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};

use crate::config::RelayerConfig;
use crate::enclave::EnclaveClient;
use crate::error::{RelayerError, Result};
use crate::listener::PollingListener;
use crate::processor::{EventProcessor, HashStored, Limits};
use crate::proof::{Ping, ProofBuilder};
use crate::rpc::{ChainClient, RpcChainClient};
use crate::submitter::{Submit, Submitter};

const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(30);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Key id the enclave daemon derives the submit key under.
const ENCLAVE_KEY_ID: &str = "rofl-relayer-eth";

pub struct Relayer {
    config: RelayerConfig,
    processor: Arc<EventProcessor>,
    source_listener: Arc<PollingListener>,
    target_listener: Arc<PollingListener>,
    enclave: Option<EnclaveClient>,
}

impl Relayer {
    pub fn new(config: RelayerConfig) -> Result<Self> {
        let monitoring = &config.monitoring;
        let source_client: Arc<dyn ChainClient> = Arc::new(RpcChainClient::connect(
            "source",
            &config.source_chain.rpc_url,
            monitoring.request_timeout,
            monitoring.retry_count,
        )?);
        let target_client: Arc<dyn ChainClient> = Arc::new(RpcChainClient::connect(
            "target",
            &config.target_chain.rpc_url,
            monitoring.request_timeout,
            monitoring.retry_count,
        )?);

        let proofs = ProofBuilder::new(source_client.clone());
        let (submitter, enclave): (Arc<dyn Submit>, Option<EnclaveClient>) = if config.local_mode
        {
            let key = config.target_chain.private_key.as_deref().ok_or_else(|| {
                RelayerError::Config("local mode requires LOCAL_PRIVATE_KEY".into())
            })?;
            let submitter = Submitter::local(
                target_client.clone(),
                config.target_chain.rpc_url.clone(),
                key,
            )?;
            (Arc::new(submitter), None)
        } else {
            let daemon = EnclaveClient::default();
            (Arc::new(Submitter::enclave(daemon.clone())), Some(daemon))
        };

        let processor = Arc::new(EventProcessor::new(
            proofs,
            submitter,
            config.target_chain.ping_receiver,
            Limits::default(),
        ));

        let source_listener = Arc::new(PollingListener::new(
            "ping",
            source_client,
            config.source_chain.ping_sender,
            Ping::SIGNATURE_HASH,
            monitoring.lookback_blocks,
            monitoring.polling_interval,
        ));
        let target_listener = Arc::new(PollingListener::new(
            "attestation",
            target_client,
            config.target_chain.rofl_adapter,
            HashStored::SIGNATURE_HASH,
            monitoring.lookback_blocks,
            monitoring.polling_interval,
        ));

        Ok(Self {
            config,
            processor,
            source_listener,
            target_listener,
            enclave,
        })
    }

    /// Runs until interrupted or until a listener fails.
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            polling_interval_secs = self.config.monitoring.polling_interval.as_secs(),
            lookback_blocks = self.config.monitoring.lookback_blocks,
            "relayer starting"
        );
        if let Some(daemon) = &self.enclave {
            announce_enclave_key(daemon).await;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (ping_tx, mut ping_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (hash_tx, mut hash_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let mut source_task = {
            let listener = self.source_listener.clone();
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move { listener.run(ping_tx, shutdown).await })
        };
        let mut target_task = {
            let listener = self.target_listener.clone();
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move { listener.run(hash_tx, shutdown).await })
        };

        let ping_dispatch = {
            let processor = self.processor.clone();
            tokio::spawn(async move {
                while let Some(log) = ping_rx.recv().await {
                    processor.process_source_event(log).await;
                }
            })
        };
        let hash_dispatch = {
            let processor = self.processor.clone();
            tokio::spawn(async move {
                while let Some(log) = hash_rx.recv().await {
                    processor.process_target_event(log).await;
                }
            })
        };
        let status_task = {
            let processor = self.processor.clone();
            let mut shutdown = shutdown_rx;
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                return;
                            }
                        }
                        _ = tokio::time::sleep(STATUS_LOG_INTERVAL) => {
                            let stats = processor.stats();
                            if stats.pending > 0 {
                                tracing::info!(
                                    pending = stats.pending,
                                    processed = stats.processed,
                                    stored = stats.stored,
                                    duplicated = stats.duplicated,
                                    invalid = stats.invalid,
                                    "relayer status"
                                );
                            }
                        }
                    }
                }
            })
        };

        tracing::info!("event monitoring started, waiting for events");

        let mut failure = None;
        let mut source_done = false;
        let mut target_done = false;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, shutting down");
            }
            result = &mut source_task => {
                failure = listener_outcome("ping listener", result);
                source_done = true;
            }
            result = &mut target_task => {
                failure = listener_outcome("attestation listener", result);
                target_done = true;
            }
        }

        let _ = shutdown_tx.send(true);
        if !source_done {
            join_task("ping listener", source_task).await;
        }
        if !target_done {
            join_task("attestation listener", target_task).await;
        }
        // Dispatchers drain and end once the listeners drop their senders.
        if tokio::time::timeout(
            SHUTDOWN_TIMEOUT,
            futures::future::join_all([ping_dispatch, hash_dispatch, status_task]),
        )
        .await
        .is_err()
        {
            tracing::warn!("dispatch tasks did not stop in time");
        }

        tracing::info!("relayer stopped");
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Classifies a listener task that ended while the relayer was running.
fn listener_outcome(
    name: &str,
    result: std::result::Result<Result<()>, JoinError>,
) -> Option<RelayerError> {
    match result {
        Ok(Ok(())) => {
            tracing::warn!(task = name, "listener ended unexpectedly, shutting down");
            None
        }
        Ok(Err(err)) => {
            tracing::error!(task = name, error = %err, "listener failed, shutting down");
            Some(err)
        }
        Err(join_err) => {
            tracing::error!(task = name, error = %join_err, "listener panicked, shutting down");
            Some(RelayerError::Transport(format!("{name} panicked: {join_err}")))
        }
    }
}

/// Awaits a task during shutdown, bounded so cleanup never hangs.
async fn join_task<T>(name: &str, task: JoinHandle<T>) {
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
        Ok(Ok(_)) => {}
        Ok(Err(err)) => tracing::warn!(task = name, error = %err, "task panicked during shutdown"),
        Err(_) => tracing::warn!(task = name, "task did not stop in time"),
    }
}

/// Asks the daemon for the app's submit key so operators can fund its
/// address. Failure is not fatal; the daemon signs with its own key either
/// way.
async fn announce_enclave_key(daemon: &EnclaveClient) {
    match daemon.generate_key(ENCLAVE_KEY_ID).await {
        Ok(key) => match key.parse::<PrivateKeySigner>() {
            Ok(signer) => {
                tracing::info!(address = %signer.address(), "enclave signing key provisioned");
            }
            Err(_) => tracing::info!("enclave signing key provisioned"),
        },
        Err(err) => {
            tracing::warn!(error = %err, "could not provision enclave signing key");
        }
    }
}
