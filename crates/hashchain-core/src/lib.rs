//! An append-only, hash-linked chain of blocks gated by a proof-of-work rule.
//!
//! [`Ledger`] owns the chain and a buffer of pending transfers. Mining stages
//! a reward, searches for a nonce that is a valid proof over the tail block's
//! nonce (see [`pow`]) and seals a new [`Block`] pointing at the tail's
//! content hash. Validation walks the chain pairwise and recomputes every
//! hash.

pub mod block;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod mine;
pub mod nodes;
pub mod pow;
pub mod shared;

pub use block::{Block, BlockSnapshot, PreviousHash, Transfer};
pub use error::{BlockDefect, ChainError, LedgerError, MiningError, SnapshotError};
pub use ledger::{check_block, validate_blocks, Ledger};
pub use nodes::NodeRegistry;
pub use pow::{proof_of_work, verify_proof, CancelFlag, Difficulty, Hash};
pub use shared::SharedLedger;
