//! Per-contract, per-event polling loop.
//!
//! On start the listener catches up over the lookback window, then polls
//! `(last_processed, head]` every interval. The cursor advances only after
//! the whole batch was handed off, so a transport failure replays the same
//! window on the next tick instead of dropping it. The loop never dies on a
//! bad tick; only cancellation (or the receiver going away) ends it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use alloy::rpc::types::{Filter, Log};
use alloy_primitives::{Address, B256};
use tokio::sync::{mpsc, watch};

use crate::error::Result;
use crate::model::NormalizedLog;
use crate::rpc::ChainClient;

/// Cursor sentinel before the initial sync completed.
const UNSYNCED: u64 = u64::MAX;

/// Snapshot of a listener's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerStatus {
    pub running: bool,
    pub last_processed: Option<u64>,
}

enum Tick {
    Advanced(u64),
    Idle,
    Closed,
}

pub struct PollingListener {
    label: &'static str,
    client: Arc<dyn ChainClient>,
    address: Address,
    event_signature: B256,
    lookback_blocks: u64,
    interval: Duration,
    running: AtomicBool,
    last_processed: AtomicU64,
}

impl PollingListener {
    pub fn new(
        label: &'static str,
        client: Arc<dyn ChainClient>,
        address: Address,
        event_signature: B256,
        lookback_blocks: u64,
        interval: Duration,
    ) -> Self {
        Self {
            label,
            client,
            address,
            event_signature,
            lookback_blocks,
            interval,
            running: AtomicBool::new(false),
            last_processed: AtomicU64::new(UNSYNCED),
        }
    }

    pub fn status(&self) -> ListenerStatus {
        let cursor = self.last_processed.load(Ordering::Relaxed);
        ListenerStatus {
            running: self.running.load(Ordering::Relaxed),
            last_processed: (cursor != UNSYNCED).then_some(cursor),
        }
    }

    /// Runs until cancelled. The initial sync is fail-fast: an unreachable
    /// chain at startup is a deployment problem, not a transient tick.
    pub async fn run(
        &self,
        events: mpsc::Sender<NormalizedLog>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        self.running.store(true, Ordering::Relaxed);
        let result = self.run_inner(events, &mut shutdown).await;
        self.running.store(false, Ordering::Relaxed);
        result
    }

    async fn run_inner(
        &self,
        events: mpsc::Sender<NormalizedLog>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let head = self.client.block_number().await?;
        let from = head.saturating_sub(self.lookback_blocks);
        let logs = self.fetch(from, head).await?;
        tracing::info!(
            listener = self.label,
            contract = %self.address,
            from,
            to = head,
            count = logs.len(),
            "initial sync"
        );
        if !self.dispatch(&events, logs).await {
            return Ok(());
        }
        self.last_processed.store(head, Ordering::Relaxed);

        loop {
            if *shutdown.borrow() {
                tracing::info!(listener = self.label, "stopping");
                return Ok(());
            }
            tokio::select! {
                _ = shutdown.changed() => {}
                _ = tokio::time::sleep(self.interval) => {
                    match self.poll(&events).await {
                        Ok(Tick::Advanced(head)) => {
                            self.last_processed.store(head, Ordering::Relaxed);
                        }
                        Ok(Tick::Idle) => {}
                        Ok(Tick::Closed) => return Ok(()),
                        Err(err) => tracing::warn!(
                            listener = self.label,
                            error = %err,
                            "poll failed, window will be retried next tick"
                        ),
                    }
                }
            }
        }
    }

    async fn poll(&self, events: &mpsc::Sender<NormalizedLog>) -> Result<Tick> {
        let last_processed = self.last_processed.load(Ordering::Relaxed);
        let head = self.client.block_number().await?;
        if head <= last_processed {
            return Ok(Tick::Idle);
        }
        let logs = self.fetch(last_processed + 1, head).await?;
        if !logs.is_empty() {
            tracing::info!(
                listener = self.label,
                count = logs.len(),
                from = last_processed + 1,
                to = head,
                "new events"
            );
        }
        if !self.dispatch(events, logs).await {
            return Ok(Tick::Closed);
        }
        Ok(Tick::Advanced(head))
    }

    async fn fetch(&self, from: u64, to: u64) -> Result<Vec<Log>> {
        let filter = Filter::new()
            .address(self.address)
            .event_signature(self.event_signature)
            .from_block(from)
            .to_block(to);
        self.client.logs(&filter).await
    }

    /// Hands logs over in emission order. Returns `false` when the receiver
    /// is gone, which means the relayer is shutting down.
    async fn dispatch(&self, events: &mpsc::Sender<NormalizedLog>, logs: Vec<Log>) -> bool {
        for log in logs {
            if events.send(log.into()).await.is_err() {
                tracing::warn!(listener = self.label, "event receiver dropped");
                return false;
            }
        }
        true
    }
}
