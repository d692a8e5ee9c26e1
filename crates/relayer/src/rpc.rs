//! Thin chain client over an alloy HTTP provider.
//!
//! Every call is bounded by the configured request timeout and retried with
//! exponential backoff (1s doubling, capped at 60s) up to the configured
//! retry count. Only transport failures are retried; chain-level "not found"
//! answers come back as `Ok(None)` for the caller to classify.

use std::future::Future;
use std::time::Duration;

use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Block, Filter, Log, TransactionReceipt};
use alloy::transports::TransportError;
use alloy_primitives::B256;
use async_trait::async_trait;

use crate::error::{RelayerError, Result};

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// The narrow chain surface the relayer consumes. Mocked in tests.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> Result<u64>;
    async fn chain_id(&self) -> Result<u64>;
    /// Block with its full transaction list.
    async fn block_by_number(&self, number: u64) -> Result<Option<Block>>;
    /// All receipts of a block via `eth_getBlockReceipts`. `Ok(None)` when
    /// the node does not know the block (or the method).
    async fn block_receipts(&self, number: u64) -> Result<Option<Vec<TransactionReceipt>>>;
    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>>;
    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>>;
    async fn gas_price(&self) -> Result<u128>;
}

/// Production [`ChainClient`] backed by an HTTP provider.
pub struct RpcChainClient {
    provider: DynProvider,
    label: &'static str,
    request_timeout: Duration,
    retry_count: u32,
}

impl RpcChainClient {
    pub fn connect(
        label: &'static str,
        rpc_url: &str,
        request_timeout: Duration,
        retry_count: u32,
    ) -> Result<Self> {
        let url = rpc_url
            .parse()
            .map_err(|err| RelayerError::Config(format!("invalid {label} rpc url: {err}")))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self {
            provider,
            label,
            request_timeout,
            retry_count,
        })
    }

    async fn retrying<T, F, Fut>(&self, rpc: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, TransportError>>,
    {
        let mut attempt = 0u32;
        let mut delay = Duration::from_secs(1);
        loop {
            let err = match tokio::time::timeout(self.request_timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => {
                    RelayerError::Transport(format!("{rpc} on {}: {err}", self.label))
                }
                Err(_) => RelayerError::Transport(format!(
                    "{rpc} on {} timed out after {:?}",
                    self.label, self.request_timeout
                )),
            };
            if attempt >= self.retry_count {
                return Err(err);
            }
            attempt += 1;
            tracing::warn!(
                chain = self.label,
                rpc,
                attempt,
                max_attempts = self.retry_count,
                delay_secs = delay.as_secs(),
                error = %err,
                "transient rpc failure, backing off"
            );
            tokio::time::sleep(delay).await;
            delay = next_backoff(delay);
        }
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn block_number(&self) -> Result<u64> {
        let provider = self.provider.clone();
        self.retrying("eth_blockNumber", move || {
            let provider = provider.clone();
            async move { provider.get_block_number().await }
        })
        .await
    }

    async fn chain_id(&self) -> Result<u64> {
        let provider = self.provider.clone();
        self.retrying("eth_chainId", move || {
            let provider = provider.clone();
            async move { provider.get_chain_id().await }
        })
        .await
    }

    async fn block_by_number(&self, number: u64) -> Result<Option<Block>> {
        let provider = self.provider.clone();
        self.retrying("eth_getBlockByNumber", move || {
            let provider = provider.clone();
            async move { provider.get_block_by_number(number.into()).full().await }
        })
        .await
    }

    async fn block_receipts(&self, number: u64) -> Result<Option<Vec<TransactionReceipt>>> {
        let provider = self.provider.clone();
        self.retrying("eth_getBlockReceipts", move || {
            let provider = provider.clone();
            async move { provider.get_block_receipts(number.into()).await }
        })
        .await
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>> {
        let provider = self.provider.clone();
        self.retrying("eth_getTransactionReceipt", move || {
            let provider = provider.clone();
            async move { provider.get_transaction_receipt(tx_hash).await }
        })
        .await
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>> {
        let provider = self.provider.clone();
        let filter = filter.clone();
        self.retrying("eth_getLogs", move || {
            let provider = provider.clone();
            let filter = filter.clone();
            async move { provider.get_logs(&filter).await }
        })
        .await
    }

    async fn gas_price(&self) -> Result<u128> {
        let provider = self.provider.clone();
        self.retrying("eth_gasPrice", move || {
            let provider = provider.clone();
            async move { provider.get_gas_price().await }
        })
        .await
    }
}

fn next_backoff(delay: Duration) -> Duration {
    (delay * 2).min(MAX_BACKOFF)
}
