//! Receipt-inclusion proof construction.
//!
//! For a matched ping this fetches the block and every receipt in it,
//! rebuilds the receipts trie, checks the root against the header and emits
//! the eight-position record the verifier contract consumes.

use std::sync::Arc;

use alloy::rpc::types::{Block, TransactionReceipt};
use alloy::sol;
use alloy::sol_types::SolEvent;
use alloy_primitives::{B256, Bytes, U256};

use crate::encoder;
use crate::error::{RelayerError, Result};
use crate::model::PingEvent;
use crate::rpc::ChainClient;
use crate::trie;

sol! {
    /// The source-chain event this relayer proves.
    #[derive(Debug)]
    event Ping(address indexed sender, uint256 indexed blockNumber);
}

/// Proof record submitted on-chain. The ancestral fields are reserved for a
/// block-chain-walk proof and stay `0`/empty to keep the verifier ABI
/// stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptProofBundle {
    pub chain_id: u64,
    pub block_number: u64,
    /// RLP of the block header.
    pub block_header: Bytes,
    pub ancestral_block_number: u64,
    pub ancestral_block_headers: Vec<Bytes>,
    /// Trie nodes from root to the receipt leaf.
    pub receipt_proof: Vec<Bytes>,
    /// RLP of the transaction index (empty-string form for index 0).
    pub transaction_index: Bytes,
    /// Position of the ping log within its transaction's log list.
    pub log_index: u64,
}

/// Builds [`ReceiptProofBundle`]s against the source chain.
pub struct ProofBuilder {
    client: Arc<dyn ChainClient>,
}

impl ProofBuilder {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    pub async fn generate(&self, ping: &PingEvent) -> Result<ReceiptProofBundle> {
        let receipt = self
            .client
            .transaction_receipt(ping.tx_hash)
            .await?
            .ok_or_else(|| {
                RelayerError::ChainDataUnavailable(format!(
                    "no receipt for transaction {}",
                    ping.tx_hash
                ))
            })?;

        let log_index = intra_transaction_log_index(&receipt, ping);
        let block_number = receipt.block_number.ok_or_else(|| {
            RelayerError::ChainDataUnavailable(format!(
                "receipt for {} carries no block number",
                ping.tx_hash
            ))
        })?;
        let tx_index = receipt.transaction_index.ok_or_else(|| {
            RelayerError::ChainDataUnavailable(format!(
                "receipt for {} carries no transaction index",
                ping.tx_hash
            ))
        })?;

        let block = self
            .client
            .block_by_number(block_number)
            .await?
            .ok_or_else(|| {
                RelayerError::ChainDataUnavailable(format!("block {block_number} not found"))
            })?;

        let mut receipts = self.block_receipts(&block, block_number).await?;
        receipts.sort_by_key(|r| r.transaction_index.unwrap_or(u64::MAX));
        let encoded: Vec<Vec<u8>> = receipts.iter().map(encoder::encode_receipt).collect();
        tracing::debug!(
            block = block_number,
            receipts = encoded.len(),
            tx_index,
            "building receipts trie"
        );

        let proof =
            trie::build_receipts_proof(&encoded, tx_index, block.header.inner.receipts_root)?;
        let header_rlp = encoder::encode_block_header(&block.header);
        let chain_id = self.client.chain_id().await?;

        tracing::info!(
            ping = %ping.ping_id,
            block = block_number,
            proof_nodes = proof.len(),
            "proof generated"
        );

        Ok(ReceiptProofBundle {
            chain_id,
            block_number,
            block_header: header_rlp.into(),
            ancestral_block_number: 0,
            ancestral_block_headers: Vec::new(),
            receipt_proof: proof,
            transaction_index: encoder::encode_transaction_index(tx_index).into(),
            log_index,
        })
    }

    /// All receipts of the block, preferring the batched call and falling
    /// back to per-transaction fetches on nodes without it.
    async fn block_receipts(
        &self,
        block: &Block,
        block_number: u64,
    ) -> Result<Vec<TransactionReceipt>> {
        if let Some(receipts) = self.client.block_receipts(block_number).await? {
            return Ok(receipts);
        }
        tracing::debug!(
            block = block_number,
            "eth_getBlockReceipts unavailable, fetching receipts per transaction"
        );
        let mut receipts = Vec::new();
        for tx_hash in block.transactions.hashes() {
            let receipt = self
                .client
                .transaction_receipt(tx_hash)
                .await?
                .ok_or_else(|| {
                    RelayerError::ChainDataUnavailable(format!(
                        "missing receipt for {tx_hash} in block {block_number}"
                    ))
                })?;
            receipts.push(receipt);
        }
        Ok(receipts)
    }
}

/// Position of the ping event within its own transaction's log list, located
/// by topic content rather than the block-global log index. Defaults to 0
/// with a warning when no log matches.
fn intra_transaction_log_index(receipt: &TransactionReceipt, ping: &PingEvent) -> u64 {
    let sender_topic = ping.sender.into_word();
    let block_topic = B256::from(U256::from(ping.block_number));
    for (i, log) in receipt.inner.logs().iter().enumerate() {
        let topics = log.topics();
        if topics.len() >= 3
            && topics[0] == Ping::SIGNATURE_HASH
            && topics[1] == sender_topic
            && topics[2] == block_topic
        {
            return i as u64;
        }
    }
    tracing::warn!(
        tx = %ping.tx_hash,
        "ping event not found in transaction logs, defaulting log index to 0"
    );
    0
}
