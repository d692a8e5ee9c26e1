//! Proof submission to the verifier contract.
//!
//! Two routes: sign locally and broadcast through the target RPC, or hand
//! the unsigned call to the enclave signer daemon which signs and submits
//! on the relayer's behalf.

use std::sync::Arc;
use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolCall;
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::enclave::EnclaveClient;
use crate::error::{RelayerError, Result};
use crate::proof::ReceiptProofBundle;
use crate::rpc::ChainClient;

/// Fixed gas headroom for `receivePing`.
const GAS_LIMIT: u64 = 3_000_000;
/// How long to wait for the submission receipt in local mode.
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(30);

sol! {
    /// Proof record as the verifier contract declares it.
    #[derive(Debug)]
    struct ReceiptProof {
        uint256 chainId;
        uint256 blockNumber;
        bytes blockHeader;
        uint256 ancestralBlockNumber;
        bytes[] ancestralBlockHeaders;
        bytes[] receiptProof;
        bytes transactionIndex;
        uint256 logIndex;
    }

    function receivePing(ReceiptProof proof) external;
}

/// What a successful submission produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Local mode: the confirmed transaction hash.
    Confirmed(B256),
    /// Enclave mode: the daemon accepted the call; it does not report a
    /// transaction hash.
    Delegated,
}

/// Submission seam, mocked in tests.
#[async_trait]
pub trait Submit: Send + Sync {
    async fn submit(&self, receiver: Address, bundle: &ReceiptProofBundle)
    -> Result<SubmitOutcome>;
}

enum SubmitMode {
    Local {
        client: Arc<dyn ChainClient>,
        rpc_url: String,
        signer: PrivateKeySigner,
    },
    Enclave {
        daemon: EnclaveClient,
    },
}

/// Routes proofs to the verifier through the configured signing mode.
pub struct Submitter {
    mode: SubmitMode,
}

impl Submitter {
    pub fn local(
        client: Arc<dyn ChainClient>,
        rpc_url: String,
        private_key: &str,
    ) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|err| RelayerError::Config(format!("invalid private key: {err}")))?;
        tracing::info!(signer = %signer.address(), "local submitter ready");
        Ok(Self {
            mode: SubmitMode::Local {
                client,
                rpc_url,
                signer,
            },
        })
    }

    pub fn enclave(daemon: EnclaveClient) -> Self {
        Self {
            mode: SubmitMode::Enclave { daemon },
        }
    }
}

#[async_trait]
impl Submit for Submitter {
    async fn submit(
        &self,
        receiver: Address,
        bundle: &ReceiptProofBundle,
    ) -> Result<SubmitOutcome> {
        let input = encode_call(bundle);
        match &self.mode {
            SubmitMode::Local {
                client,
                rpc_url,
                signer,
            } => {
                let gas_price = client.gas_price().await?;
                let url = rpc_url.parse().map_err(|err| {
                    RelayerError::Config(format!("invalid target rpc url: {err}"))
                })?;
                let wallet = EthereumWallet::from(signer.clone());
                let provider = ProviderBuilder::new().wallet(wallet).connect_http(url);

                let tx = TransactionRequest::default()
                    .to(receiver)
                    .input(input.into())
                    .gas_limit(GAS_LIMIT)
                    .gas_price(gas_price);

                let pending = provider
                    .send_transaction(tx)
                    .await
                    .map_err(|err| RelayerError::Submission(err.to_string()))?;
                let tx_hash = *pending.tx_hash();
                tracing::info!(%tx_hash, %receiver, "proof submitted, awaiting receipt");

                let receipt = pending
                    .with_timeout(Some(RECEIPT_TIMEOUT))
                    .get_receipt()
                    .await
                    .map_err(|err| {
                        RelayerError::Submission(format!("awaiting receipt for {tx_hash}: {err}"))
                    })?;
                if !receipt.status() {
                    return Err(RelayerError::Submission(format!(
                        "verifier reverted transaction {tx_hash}"
                    )));
                }
                tracing::info!(%tx_hash, block = ?receipt.block_number, "proof confirmed on-chain");
                Ok(SubmitOutcome::Confirmed(tx_hash))
            }
            SubmitMode::Enclave { daemon } => {
                tracing::info!(%receiver, "handing proof to enclave signer daemon");
                daemon.sign_submit(GAS_LIMIT, receiver, 0, &input).await?;
                Ok(SubmitOutcome::Delegated)
            }
        }
    }
}

/// ABI-encodes the `receivePing` call for a proof bundle.
fn encode_call(bundle: &ReceiptProofBundle) -> Vec<u8> {
    receivePingCall {
        proof: ReceiptProof {
            chainId: U256::from(bundle.chain_id),
            blockNumber: U256::from(bundle.block_number),
            blockHeader: bundle.block_header.clone(),
            ancestralBlockNumber: U256::from(bundle.ancestral_block_number),
            ancestralBlockHeaders: bundle.ancestral_block_headers.clone(),
            receiptProof: bundle.receipt_proof.clone(),
            transactionIndex: bundle.transaction_index.clone(),
            logIndex: U256::from(bundle.log_index),
        },
    }
    .abi_encode()
}
