//! Canonical RLP encoding of receipts, block headers and transaction
//! indices.
//!
//! Receipts follow the EIP-2718 envelope: `[status, cumulativeGasUsed,
//! logsBloom, logs]`, prefixed by the single type byte for non-legacy
//! transactions. Headers are encoded with every hardfork field the network
//! populates (baseFeePerGas, withdrawalsRoot, blobGasUsed, excessBlobGas,
//! parentBeaconBlockRoot, requestsHash), in activation order.

use alloy::rpc::types::{Header, TransactionReceipt};
use alloy_consensus::ReceiptEnvelope;
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::keccak256;
use alloy_rlp::Encodable;

/// Canonical receipt bytes as stored in the receipts trie.
pub fn encode_receipt(receipt: &TransactionReceipt) -> Vec<u8> {
    let envelope: ReceiptEnvelope = receipt.inner.clone().map_logs(|log| log.inner);
    envelope.encoded_2718()
}

/// RLP of the block header, hardfork fields included when present.
///
/// When debug logging is enabled the keccak of the output is checked against
/// the canonical block hash; a mismatch means the network appends fields this
/// encoder does not know about and the resulting proof would not verify.
pub fn encode_block_header(header: &Header) -> Vec<u8> {
    let mut out = Vec::with_capacity(header.inner.length());
    header.inner.encode(&mut out);

    if tracing::enabled!(tracing::Level::DEBUG) {
        let computed = keccak256(&out);
        if computed != header.hash {
            tracing::warn!(
                %computed,
                expected = %header.hash,
                "encoded header hash does not match the canonical block hash; \
                 the network may use non-standard header fields"
            );
        }
    }
    out
}

/// RLP of a transaction index, used both as the trie key and in the proof.
///
/// Index 0 encodes as the RLP of the empty byte string, not the integer 0.
pub fn encode_transaction_index(index: u64) -> Vec<u8> {
    if index == 0 {
        vec![alloy_rlp::EMPTY_STRING_CODE]
    } else {
        alloy_rlp::encode(index)
    }
}
