//! Receipts-trie construction and Merkle proof extraction.
//!
//! Leaves are canonical receipt bytes keyed by the RLP of their transaction
//! index. [`HashBuilder`] requires keys in ascending nibble order, which is
//! not transaction order once indices cross 0x7f; insertion therefore walks
//! the RLP-sorted index permutation.

use alloy_primitives::{B256, Bytes};
use alloy_trie::{EMPTY_ROOT_HASH, HashBuilder, Nibbles, proof::ProofRetainer};

use crate::encoder::encode_transaction_index;
use crate::error::{RelayerError, Result};

/// Maps insertion position to transaction index such that the resulting
/// RLP-encoded keys come out in ascending nibble order: indices 1..=0x7f
/// first, then 0 (whose key is `0x80`), then the multi-byte encodings.
fn adjust_index_for_rlp(i: usize, len: usize) -> usize {
    if i > 0x7f {
        i
    } else if i == 0x7f || i + 1 == len {
        0
    } else {
        i + 1
    }
}

/// Root of the receipts trie for a block's ordered, canonically encoded
/// receipts.
pub fn receipts_trie_root(encoded_receipts: &[Vec<u8>]) -> B256 {
    if encoded_receipts.is_empty() {
        return EMPTY_ROOT_HASH;
    }
    let mut builder = HashBuilder::default();
    for i in 0..encoded_receipts.len() {
        let index = adjust_index_for_rlp(i, encoded_receipts.len());
        builder.add_leaf(
            Nibbles::unpack(encode_transaction_index(index as u64)),
            &encoded_receipts[index],
        );
    }
    builder.root()
}

/// Builds the receipts trie, checks its root against the header's
/// `receiptsRoot` and returns the ordered root-to-leaf proof nodes for the
/// target transaction index.
///
/// A root mismatch is an encoding bug (or a non-standard network), never a
/// transient condition, and is reported as [`RelayerError::Encoding`].
pub fn build_receipts_proof(
    encoded_receipts: &[Vec<u8>],
    target_index: u64,
    expected_root: B256,
) -> Result<Vec<Bytes>> {
    if target_index as usize >= encoded_receipts.len() {
        return Err(RelayerError::ChainDataUnavailable(format!(
            "transaction index {target_index} out of bounds, block has {} receipts",
            encoded_receipts.len()
        )));
    }

    let target_key = Nibbles::unpack(encode_transaction_index(target_index));
    let retainer = ProofRetainer::new(vec![target_key]);
    let mut builder = HashBuilder::default().with_proof_retainer(retainer);
    for i in 0..encoded_receipts.len() {
        let index = adjust_index_for_rlp(i, encoded_receipts.len());
        builder.add_leaf(
            Nibbles::unpack(encode_transaction_index(index as u64)),
            &encoded_receipts[index],
        );
    }

    let root = builder.root();
    if root != expected_root {
        return Err(RelayerError::Encoding(format!(
            "receipts trie root mismatch: calculated {root}, header has {expected_root}"
        )));
    }

    let proof = builder
        .take_proof_nodes()
        .into_nodes_sorted()
        .into_iter()
        .map(|(_, node)| node)
        .collect();
    Ok(proof)
}
