//! Shared fixtures: an in-memory chain client and a recording submitter.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use alloy::rpc::types::{
    Block, BlockTransactions, Filter, FilterBlockOption, Header, Log as RpcLog,
    TransactionReceipt,
};
use alloy::sol_types::SolEvent;
use alloy_consensus::{Receipt, ReceiptEnvelope, ReceiptWithBloom, proofs};
use alloy_primitives::{Address, B256, Bloom, Bytes, LogData, U256, keccak256};
use async_trait::async_trait;

use rofl_relayer::error::{RelayerError, Result};
use rofl_relayer::model::NormalizedLog;
use rofl_relayer::processor::HashStored;
use rofl_relayer::proof::{Ping, ReceiptProofBundle};
use rofl_relayer::rpc::ChainClient;
use rofl_relayer::submitter::{Submit, SubmitOutcome};

/// In-memory source of blocks, receipts and logs.
pub struct MockChain {
    chain_id: u64,
    head: Mutex<u64>,
    blocks: Mutex<HashMap<u64, Block>>,
    receipts: Mutex<HashMap<u64, Vec<TransactionReceipt>>>,
    by_tx: Mutex<HashMap<B256, TransactionReceipt>>,
    logs: Mutex<Vec<RpcLog>>,
    /// When false, `eth_getBlockReceipts` answers `None` to exercise the
    /// per-transaction fallback.
    batched_receipts: Mutex<bool>,
    /// When true, `eth_getLogs` fails with a transport error.
    fail_logs: Mutex<bool>,
}

impl MockChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            head: Mutex::new(0),
            blocks: Mutex::new(HashMap::new()),
            receipts: Mutex::new(HashMap::new()),
            by_tx: Mutex::new(HashMap::new()),
            logs: Mutex::new(Vec::new()),
            batched_receipts: Mutex::new(true),
            fail_logs: Mutex::new(false),
        }
    }

    pub fn set_head(&self, head: u64) {
        *self.head.lock().unwrap() = head;
    }

    pub fn set_batched_receipts(&self, enabled: bool) {
        *self.batched_receipts.lock().unwrap() = enabled;
    }

    pub fn set_fail_logs(&self, fail: bool) {
        *self.fail_logs.lock().unwrap() = fail;
    }

    /// Installs a block whose header commits to the given receipts; returns
    /// the deterministic transaction hashes.
    pub fn install_block(&self, number: u64, envelopes: Vec<ReceiptEnvelope>) -> Vec<B256> {
        let tx_hashes: Vec<B256> = (0..envelopes.len())
            .map(|i| keccak256(format!("tx-{number}-{i}")))
            .collect();
        let receipts_root = proofs::calculate_receipt_root(&envelopes);
        let inner = alloy_consensus::Header {
            number,
            receipts_root,
            gas_limit: 30_000_000,
            gas_used: 21_000 * envelopes.len() as u64,
            timestamp: 1_700_000_000 + number,
            base_fee_per_gas: Some(7),
            ..Default::default()
        };
        let hash = inner.hash_slow();
        let header = Header {
            hash,
            inner,
            total_difficulty: None,
            size: None,
        };
        let block = Block {
            header,
            uncles: Vec::new(),
            transactions: BlockTransactions::Hashes(tx_hashes.clone()),
            withdrawals: None,
        };

        let mut receipts = Vec::new();
        for (i, envelope) in envelopes.into_iter().enumerate() {
            let rpc_envelope = envelope.map_logs(|log| RpcLog {
                inner: log,
                block_hash: Some(hash),
                block_number: Some(number),
                block_timestamp: None,
                transaction_hash: Some(tx_hashes[i]),
                transaction_index: Some(i as u64),
                log_index: Some(i as u64),
                removed: false,
            });
            let receipt = TransactionReceipt {
                inner: rpc_envelope,
                transaction_hash: tx_hashes[i],
                transaction_index: Some(i as u64),
                block_hash: Some(hash),
                block_number: Some(number),
                gas_used: 21_000,
                effective_gas_price: 1_000_000_000,
                blob_gas_used: None,
                blob_gas_price: None,
                from: Address::ZERO,
                to: Some(Address::repeat_byte(0xEE)),
                contract_address: None,
            };
            self.by_tx
                .lock()
                .unwrap()
                .insert(tx_hashes[i], receipt.clone());
            receipts.push(receipt);
        }

        self.blocks.lock().unwrap().insert(number, block);
        self.receipts.lock().unwrap().insert(number, receipts);
        let mut head = self.head.lock().unwrap();
        *head = (*head).max(number);
        tx_hashes
    }

    /// Queues a log for `eth_getLogs` at the given block.
    pub fn add_log(&self, block_number: u64, topics: Vec<B256>, data: Bytes) {
        let index = self.logs.lock().unwrap().len() as u64;
        self.logs.lock().unwrap().push(RpcLog {
            inner: alloy_primitives::Log {
                address: Address::repeat_byte(0x01),
                data: LogData::new_unchecked(topics, data),
            },
            block_hash: None,
            block_number: Some(block_number),
            block_timestamp: None,
            transaction_hash: Some(keccak256(format!("log-tx-{block_number}-{index}"))),
            transaction_index: Some(0),
            log_index: Some(index),
            removed: false,
        });
    }

    pub fn block_hash(&self, number: u64) -> B256 {
        self.blocks.lock().unwrap()[&number].header.hash
    }

    pub fn receipts_root(&self, number: u64) -> B256 {
        self.blocks.lock().unwrap()[&number].header.inner.receipts_root
    }

    pub fn receipt(&self, tx_hash: B256) -> TransactionReceipt {
        self.by_tx.lock().unwrap()[&tx_hash].clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn block_number(&self) -> Result<u64> {
        Ok(*self.head.lock().unwrap())
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn block_by_number(&self, number: u64) -> Result<Option<Block>> {
        Ok(self.blocks.lock().unwrap().get(&number).cloned())
    }

    async fn block_receipts(&self, number: u64) -> Result<Option<Vec<TransactionReceipt>>> {
        if !*self.batched_receipts.lock().unwrap() {
            return Ok(None);
        }
        Ok(self.receipts.lock().unwrap().get(&number).cloned())
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>> {
        Ok(self.by_tx.lock().unwrap().get(&tx_hash).cloned())
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<RpcLog>> {
        if *self.fail_logs.lock().unwrap() {
            return Err(RelayerError::Transport("mock rpc outage".into()));
        }
        let (from, to) = match filter.block_option {
            FilterBlockOption::Range {
                from_block,
                to_block,
            } => (
                from_block.and_then(|b| b.as_number()).unwrap_or(0),
                to_block.and_then(|b| b.as_number()).unwrap_or(u64::MAX),
            ),
            _ => (0, u64::MAX),
        };
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| {
                log.block_number
                    .is_some_and(|number| number >= from && number <= to)
            })
            .cloned()
            .collect())
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(1_000_000_000)
    }
}

/// Captures submissions instead of talking to a chain.
#[derive(Default)]
pub struct RecordingSubmitter {
    calls: Mutex<Vec<(Address, ReceiptProofBundle)>>,
    fail: Mutex<bool>,
}

impl RecordingSubmitter {
    pub fn calls(&self) -> Vec<(Address, ReceiptProofBundle)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl Submit for RecordingSubmitter {
    async fn submit(
        &self,
        receiver: Address,
        bundle: &ReceiptProofBundle,
    ) -> Result<SubmitOutcome> {
        if *self.fail.lock().unwrap() {
            return Err(RelayerError::Submission("mock rejection".into()));
        }
        self.calls.lock().unwrap().push((receiver, bundle.clone()));
        Ok(SubmitOutcome::Confirmed(B256::repeat_byte(0x77)))
    }
}

/// Receipt with a single unrelated log.
pub fn plain_receipt(seed: u8) -> ReceiptEnvelope {
    let receipt = Receipt {
        status: true.into(),
        cumulative_gas_used: 21_000 * (seed as u64 + 1),
        logs: vec![noise_log(seed)],
    };
    ReceiptEnvelope::Eip1559(ReceiptWithBloom::new(receipt, Bloom::default()))
}

/// Legacy (type 0) receipt with a single unrelated log.
pub fn legacy_receipt(seed: u8) -> ReceiptEnvelope {
    let receipt = Receipt {
        status: true.into(),
        cumulative_gas_used: 21_000 * (seed as u64 + 1),
        logs: vec![noise_log(seed)],
    };
    ReceiptEnvelope::Legacy(ReceiptWithBloom::new(receipt, Bloom::default()))
}

/// EIP-1559 receipt carrying a ping log preceded by `noise_before` other
/// logs, so the intra-transaction index is `noise_before`.
pub fn receipt_with_ping(sender: Address, block_number: u64, noise_before: usize) -> ReceiptEnvelope {
    let mut logs: Vec<alloy_primitives::Log> =
        (0..noise_before).map(|i| noise_log(i as u8)).collect();
    logs.push(ping_inner_log(sender, block_number));
    let receipt = Receipt {
        status: true.into(),
        cumulative_gas_used: 42_000,
        logs,
    };
    ReceiptEnvelope::Eip1559(ReceiptWithBloom::new(receipt, Bloom::default()))
}

/// Legacy (type 0) receipt carrying a ping log at position 0.
pub fn legacy_receipt_with_ping(sender: Address, block_number: u64) -> ReceiptEnvelope {
    let receipt = Receipt {
        status: true.into(),
        cumulative_gas_used: 42_000,
        logs: vec![ping_inner_log(sender, block_number)],
    };
    ReceiptEnvelope::Legacy(ReceiptWithBloom::new(receipt, Bloom::default()))
}

pub fn ping_inner_log(sender: Address, block_number: u64) -> alloy_primitives::Log {
    alloy_primitives::Log {
        address: Address::repeat_byte(0x01),
        data: LogData::new_unchecked(
            vec![
                Ping::SIGNATURE_HASH,
                sender.into_word(),
                B256::from(U256::from(block_number)),
            ],
            Bytes::new(),
        ),
    }
}

fn noise_log(seed: u8) -> alloy_primitives::Log {
    alloy_primitives::Log {
        address: Address::repeat_byte(0x02),
        data: LogData::new_unchecked(vec![B256::repeat_byte(seed)], Bytes::new()),
    }
}

/// Normalized ping log as the source listener would deliver it.
pub fn ping_log(tx_hash: B256, sender: Address, block_number: u64) -> NormalizedLog {
    NormalizedLog {
        address: Address::repeat_byte(0x01),
        topics: vec![
            Ping::SIGNATURE_HASH,
            sender.into_word(),
            B256::from(U256::from(block_number)),
        ],
        data: B256::from(U256::from(1_700_000_000u64)).0.to_vec().into(),
        block_number: Some(block_number),
        tx_hash: Some(tx_hash),
        log_index: Some(0),
    }
}

/// Normalized attestation log as the target listener would deliver it.
pub fn attestation_log(block_id: u64, block_hash: B256) -> NormalizedLog {
    NormalizedLog {
        address: Address::repeat_byte(0x03),
        topics: vec![
            HashStored::SIGNATURE_HASH,
            B256::from(U256::from(block_id)),
            block_hash,
        ],
        data: Bytes::new(),
        block_number: Some(1),
        tx_hash: Some(B256::repeat_byte(0x99)),
        log_index: Some(0),
    }
}
