//! Bounded coordination state.
//!
//! Three structures, each with explicit capacity and oldest-first eviction:
//! the processed-transaction set (dedupe), the pending table (pings waiting
//! for an attestation, indexed by block and queued FIFO), and the stored
//! block-hash table. The processor is the only owner.

use std::collections::{HashMap, HashSet, VecDeque};

use alloy_primitives::B256;

use crate::model::PingEvent;

/// Default capacity for each bounded structure.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Insertion-ordered set of transaction hashes with bounded capacity.
///
/// Hybrid layout: a deque for eviction order, a hash set for O(1) membership.
#[derive(Debug)]
pub struct ProcessedSet {
    order: VecDeque<B256>,
    seen: HashSet<B256>,
    capacity: usize,
}

impl ProcessedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity.min(1024)),
            seen: HashSet::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Inserts the hash, evicting the oldest entry when at capacity.
    /// Returns `false` when the hash was already present.
    pub fn insert(&mut self, tx_hash: B256) -> bool {
        if self.seen.contains(&tx_hash) {
            return false;
        }
        if self.order.len() == self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        self.order.push_back(tx_hash);
        self.seen.insert(tx_hash);
        true
    }

    pub fn contains(&self, tx_hash: &B256) -> bool {
        self.seen.contains(tx_hash)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Pings waiting for their block's attestation.
///
/// Two views kept in sync: a per-block index for O(1) lookup and a FIFO
/// queue for O(1) oldest-first eviction. Every ping in one view is in the
/// other.
#[derive(Debug)]
pub struct PendingTable {
    by_block: HashMap<u64, Vec<PingEvent>>,
    queue: VecDeque<PingEvent>,
    capacity: usize,
}

impl PendingTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            by_block: HashMap::new(),
            queue: VecDeque::new(),
            capacity,
        }
    }

    /// Appends a ping to both views. When at capacity the oldest ping is
    /// evicted first and returned to the caller for logging.
    pub fn insert(&mut self, ping: PingEvent) -> Option<PingEvent> {
        let evicted = if self.queue.len() == self.capacity {
            self.evict_oldest()
        } else {
            None
        };
        self.by_block
            .entry(ping.block_number)
            .or_default()
            .push(ping.clone());
        self.queue.push_back(ping);
        evicted
    }

    /// Pings recorded for the given block, in arrival order.
    pub fn pings_for_block(&self, block_number: u64) -> Vec<PingEvent> {
        self.by_block
            .get(&block_number)
            .cloned()
            .unwrap_or_default()
    }

    /// Removes a specific ping from both views. Returns whether it was
    /// present.
    pub fn remove(&mut self, ping: &PingEvent) -> bool {
        let Some(list) = self.by_block.get_mut(&ping.block_number) else {
            return false;
        };
        let Some(pos) = list.iter().position(|p| p.ping_id == ping.ping_id) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            self.by_block.remove(&ping.block_number);
        }
        if let Some(pos) = self.queue.iter().position(|p| p.ping_id == ping.ping_id) {
            self.queue.remove(pos);
        }
        true
    }

    /// Drops the oldest ping from both views.
    pub fn evict_oldest(&mut self) -> Option<PingEvent> {
        let oldest = self.queue.pop_front()?;
        if let Some(list) = self.by_block.get_mut(&oldest.block_number) {
            if let Some(pos) = list.iter().position(|p| p.ping_id == oldest.ping_id) {
                list.remove(pos);
            }
            if list.is_empty() {
                self.by_block.remove(&oldest.block_number);
            }
        }
        Some(oldest)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Insertion-ordered `block_number -> block_hash` map with bounded capacity.
#[derive(Debug)]
pub struct StoredHashes {
    order: VecDeque<u64>,
    map: HashMap<u64, B256>,
    capacity: usize,
}

impl StoredHashes {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            map: HashMap::new(),
            capacity,
        }
    }

    /// Records the hash for a block. A repeated block number updates the
    /// hash in place without changing its eviction position.
    pub fn insert(&mut self, block_number: u64, block_hash: B256) {
        if self.map.insert(block_number, block_hash).is_some() {
            return;
        }
        if self.order.len() == self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.map.remove(&oldest);
        }
        self.order.push_back(block_number);
    }

    pub fn get(&self, block_number: u64) -> Option<B256> {
        self.map.get(&block_number).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
