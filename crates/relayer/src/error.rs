//! Error taxonomy for the relayer.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RelayerError>;

#[derive(Debug, Error)]
pub enum RelayerError {
    /// Startup misconfiguration. Surfaced immediately, never retried.
    #[error("config: {0}")]
    Config(String),

    /// RPC or socket I/O failure. Retried with backoff up to the configured
    /// count, then propagated to the caller.
    #[error("transport: {0}")]
    Transport(String),

    /// A receipt or block the proof needs is missing or pruned. Recorded and
    /// skipped for the ping that needed it.
    #[error("chain data unavailable: {0}")]
    ChainDataUnavailable(String),

    /// Trie root or header hash disagreement. Fatal for the submission,
    /// never retried.
    #[error("encoding mismatch: {0}")]
    Encoding(String),

    /// The verifier rejected the proof or the signer daemon reported an
    /// error. The ping stays pending so a later attestation can re-trigger.
    #[error("submission failed: {0}")]
    Submission(String),

    /// Malformed event content. Counted and dropped.
    #[error("malformed event: {0}")]
    Parse(String),
}

impl RelayerError {
    /// Transport failures are the only kind the retry layer re-attempts.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
