//! Event coordination core.
//!
//! One object holds every piece of mutable state: the dedupe set, the
//! pending table and the stored-hashes table, all behind a single mutex
//! taken only for structural updates. Proof generation and submission
//! happen outside the lock. Two entry points, one per listener; pings are
//! dispatched to proof generation only when an attestation for their block
//! arrives.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use alloy::sol;
use alloy::sol_types::SolEvent;
use alloy_primitives::Address;

use crate::model::{NormalizedLog, PingEvent, topic_to_address, topic_to_u64};
use crate::proof::{Ping, ProofBuilder};
use crate::state::{DEFAULT_CAPACITY, PendingTable, ProcessedSet, StoredHashes};
use crate::submitter::Submit;

sol! {
    /// Header attestation emitted by the oracle adapter on the target chain.
    #[derive(Debug)]
    event HashStored(uint256 indexed id, bytes32 indexed hash);
}

/// Capacity bounds for the coordination state.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_processed: usize,
    pub max_pending: usize,
    pub max_stored: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_processed: DEFAULT_CAPACITY,
            max_pending: DEFAULT_CAPACITY,
            max_stored: DEFAULT_CAPACITY,
        }
    }
}

/// Observability counters and collection sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub processed: usize,
    pub pending: usize,
    pub stored: usize,
    pub filtered: u64,
    pub duplicated: u64,
    pub invalid: u64,
}

struct Shared {
    processed: ProcessedSet,
    pending: PendingTable,
    stored: StoredHashes,
}

pub struct EventProcessor {
    shared: Mutex<Shared>,
    filtered: AtomicU64,
    duplicated: AtomicU64,
    invalid: AtomicU64,
    proofs: ProofBuilder,
    submitter: Arc<dyn Submit>,
    receiver: Address,
}

impl EventProcessor {
    pub fn new(
        proofs: ProofBuilder,
        submitter: Arc<dyn Submit>,
        receiver: Address,
        limits: Limits,
    ) -> Self {
        Self {
            shared: Mutex::new(Shared {
                processed: ProcessedSet::new(limits.max_processed),
                pending: PendingTable::new(limits.max_pending),
                stored: StoredHashes::new(limits.max_stored),
            }),
            filtered: AtomicU64::new(0),
            duplicated: AtomicU64::new(0),
            invalid: AtomicU64::new(0),
            proofs,
            submitter,
            receiver,
        }
    }

    /// Ping path: dedupe, parse, queue.
    pub async fn process_source_event(&self, log: NormalizedLog) {
        if log.topics.first() != Some(&Ping::SIGNATURE_HASH) {
            self.filtered.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(topic = ?log.topics.first(), "filtered non-ping log");
            return;
        }
        let Some(tx_hash) = log.tx_hash else {
            self.invalid.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("ping log carries no transaction hash");
            return;
        };
        {
            let mut shared = self.lock();
            if !shared.processed.insert(tx_hash) {
                self.duplicated.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(tx = %tx_hash, "duplicate ping log ignored");
                return;
            }
        }
        if log.topics.len() < 3 {
            self.invalid.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(tx = %tx_hash, topics = log.topics.len(), "ping log missing topics");
            return;
        }
        let sender = topic_to_address(&log.topics[1]);
        let Some(block_number) = topic_to_u64(&log.topics[2]) else {
            self.invalid.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(tx = %tx_hash, "ping block number does not fit in u64");
            return;
        };
        let timestamp = event_timestamp(&log);

        let ping = PingEvent::new(tx_hash, block_number, sender, timestamp);
        tracing::info!(
            tx = %tx_hash,
            block = block_number,
            %sender,
            ping = %ping.ping_id,
            "ping observed, awaiting attestation"
        );

        let evicted = self.lock().pending.insert(ping);
        if let Some(evicted) = evicted {
            tracing::warn!(
                ping = %evicted.ping_id,
                block = evicted.block_number,
                "pending queue full, evicted oldest ping"
            );
        }
    }

    /// Attestation path: store the hash, relay every ping of that block.
    pub async fn process_target_event(&self, log: NormalizedLog) {
        if log.topics.first() != Some(&HashStored::SIGNATURE_HASH) {
            self.filtered.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(topic = ?log.topics.first(), "filtered non-attestation log");
            return;
        }
        if log.topics.len() < 3 {
            self.invalid.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(topics = log.topics.len(), "attestation log missing topics");
            return;
        }
        let Some(block_id) = topic_to_u64(&log.topics[1]) else {
            self.invalid.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("attestation block id does not fit in u64");
            return;
        };
        let block_hash = log.topics[2];

        let matching = {
            let mut shared = self.lock();
            shared.stored.insert(block_id, block_hash);
            shared.pending.pings_for_block(block_id)
        };
        tracing::info!(
            block = block_id,
            hash = %block_hash,
            ready = matching.len(),
            "attestation stored"
        );

        for ping in matching {
            self.relay(ping).await;
        }
    }

    /// Proof generation and submission for one matched ping. The ping leaves
    /// the pending table only after the submission reports success; failures
    /// keep it queued for the next attestation of its block.
    async fn relay(&self, ping: PingEvent) {
        tracing::info!(ping = %ping.ping_id, block = ping.block_number, "relaying ping");
        let result = match self.proofs.generate(&ping).await {
            Ok(bundle) => self.submitter.submit(self.receiver, &bundle).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(outcome) => {
                self.lock().pending.remove(&ping);
                tracing::info!(ping = %ping.ping_id, ?outcome, "ping relayed");
            }
            Err(err) => {
                tracing::error!(
                    ping = %ping.ping_id,
                    block = ping.block_number,
                    error = %err,
                    "relay failed, ping stays pending"
                );
            }
        }
    }

    pub fn stats(&self) -> ProcessorStats {
        let shared = self.lock();
        ProcessorStats {
            processed: shared.processed.len(),
            pending: shared.pending.len(),
            stored: shared.stored.len(),
            filtered: self.filtered.load(Ordering::Relaxed),
            duplicated: self.duplicated.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Timestamp word from the log data, zero when the event carries none.
fn event_timestamp(log: &NormalizedLog) -> u64 {
    if log.data.len() < 32 {
        return 0;
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&log.data[24..32]);
    u64::from_be_bytes(raw)
}
