use thiserror::Error;

/// The first rule a block breaks when checked against its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockDefect {
    #[error("index {found} does not follow predecessor (expected {expected})")]
    IndexMismatch { expected: u64, found: u64 },

    #[error("predecessor index {previous} has no successor index")]
    IndexOverflow { previous: u64 },

    #[error("previous-hash link {found} does not match predecessor hash {expected}")]
    BrokenLink { expected: String, found: String },

    #[error("nonce {nonce} is not a valid proof over previous nonce {last_nonce}")]
    InvalidProof { nonce: u64, last_nonce: u64 },

    #[error("timestamp {timestamp} is not after predecessor timestamp {previous}")]
    StaleTimestamp { timestamp: u64, previous: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("chain has no blocks")]
    EmptyChain,

    #[error("genesis block is malformed: {reason}")]
    MalformedGenesis { reason: String },

    #[error("block {index} is invalid: {defect}")]
    InvalidBlock { index: usize, defect: BlockDefect },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("block {index} rejected: {defect}")]
    Rejected { index: u64, defect: BlockDefect },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiningError {
    #[error("proof-of-work over nonce {last_nonce} cancelled after {attempts} attempts")]
    Cancelled { last_nonce: u64, attempts: u64 },
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed block snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("previous-hash sentinel must be 0, got {0}")]
    BadSentinel(u64),
}
