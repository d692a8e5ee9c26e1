//! Shared data types passed between the listeners, the processor and the
//! proof pipeline.

use alloy::rpc::types::Log;
use alloy_primitives::{Address, B256, Bytes, keccak256};

/// A Ping observed on the source chain, waiting for its block to be attested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingEvent {
    /// Transaction that emitted the event.
    pub tx_hash: B256,
    /// Block the event occurred in.
    pub block_number: u64,
    /// Address that sent the ping.
    pub sender: Address,
    /// Timestamp carried in the event data, zero when absent.
    pub timestamp: u64,
    /// Stable identifier, see [`PingEvent::derive_id`].
    pub ping_id: B256,
}

impl PingEvent {
    pub fn new(tx_hash: B256, block_number: u64, sender: Address, timestamp: u64) -> Self {
        let ping_id = Self::derive_id(tx_hash, sender, block_number);
        Self {
            tx_hash,
            block_number,
            sender,
            timestamp,
            ping_id,
        }
    }

    /// `keccak256("<tx_hash>-<sender>-<block_number>")` over the lowercase
    /// `0x`-prefixed hex forms. Stable across retries, distinct across pings
    /// even within one transaction.
    pub fn derive_id(tx_hash: B256, sender: Address, block_number: u64) -> B256 {
        keccak256(format!("{tx_hash:#x}-{sender:#x}-{block_number}"))
    }
}

/// A header attestation observed on the target chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttestationRecord {
    pub block_number: u64,
    pub block_hash: B256,
}

/// Transport-normalized log record. Listeners convert provider logs into
/// this shape at the edge so the processor never sees transport types.
#[derive(Debug, Clone)]
pub struct NormalizedLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub tx_hash: Option<B256>,
    pub log_index: Option<u64>,
}

impl From<Log> for NormalizedLog {
    fn from(log: Log) -> Self {
        Self {
            address: log.inner.address,
            topics: log.inner.data.topics().to_vec(),
            data: log.inner.data.data.clone(),
            block_number: log.block_number,
            tx_hash: log.transaction_hash,
            log_index: log.log_index,
        }
    }
}

/// Reads a big-endian `u64` out of a 32-byte topic word. `None` when the
/// value does not fit.
pub(crate) fn topic_to_u64(topic: &B256) -> Option<u64> {
    if topic[..24].iter().any(|b| *b != 0) {
        return None;
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&topic[24..]);
    Some(u64::from_be_bytes(raw))
}

/// Reads the address packed into the low 20 bytes of a topic word.
pub(crate) fn topic_to_address(topic: &B256) -> Address {
    Address::from_slice(&topic[12..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    #[test]
    fn ping_id_is_stable_and_distinct() {
        let tx = B256::repeat_byte(0x11);
        let sender = Address::repeat_byte(0xAA);

        let a = PingEvent::new(tx, 7, sender, 0);
        let b = PingEvent::new(tx, 7, sender, 99);
        // Same identity regardless of timestamp.
        assert_eq!(a.ping_id, b.ping_id);

        let c = PingEvent::new(tx, 8, sender, 0);
        assert_ne!(a.ping_id, c.ping_id);
    }

    #[test]
    fn topic_u64_round_trip() {
        let topic = B256::from(U256::from(123_456u64));
        assert_eq!(topic_to_u64(&topic), Some(123_456));

        let too_big = B256::repeat_byte(0xFF);
        assert_eq!(topic_to_u64(&too_big), None);
    }

    #[test]
    fn topic_address_takes_low_twenty_bytes() {
        let sender = Address::repeat_byte(0x42);
        let topic = sender.into_word();
        assert_eq!(topic_to_address(&topic), sender);
    }
}
