//! Cross-chain event relayer for the Hashi header-oracle bridge.
//!
//! Watches a source chain for `Ping` events and the target chain for
//! `HashStored` header attestations. When a ping's block has been attested,
//! the relayer rebuilds the block's receipts trie, extracts a Merkle proof
//! of the ping's receipt and submits it to the `PingReceiver` verifier on
//! the target chain. The chain verifies the proof against the attested
//! block hash, so the relayer is liveness-critical but not safety-critical.

pub mod config;
pub mod enclave;
pub mod encoder;
pub mod error;
pub mod listener;
pub mod model;
pub mod processor;
pub mod proof;
pub mod relayer;
pub mod rpc;
pub mod state;
pub mod submitter;
pub mod trie;

pub use crate::config::RelayerConfig;
pub use crate::error::{RelayerError, Result};
pub use crate::relayer::Relayer;
