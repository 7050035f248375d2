use crate::{
    block::{Block, BlockSnapshot},
    error::{ChainError, LedgerError, MiningError},
    ledger::Ledger,
    pow::{CancelFlag, Difficulty},
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A [`Ledger`] behind one lock, for callers that mine off the calling thread.
///
/// Every operation takes the lock for its whole duration. Mining holds it
/// from reading the tail nonce through sealing, so no staging or other seal
/// can slip in between.
#[derive(Clone, Debug, Default)]
pub struct SharedLedger {
    inner: Arc<Mutex<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    pub fn with_difficulty(difficulty: Difficulty) -> Self {
        Self::new(Ledger::with_difficulty(difficulty))
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        // A panic mid-operation cannot leave the chain half-appended, so a
        // poisoned lock still guards a usable ledger.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the ledger.
    pub fn with<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn stage_data(&self, sender: impl Into<String>, recipient: impl Into<String>, quantity: u64) -> bool {
        self.lock().stage_data(sender, recipient, quantity)
    }

    pub fn mine_block(&self, miner: &str) -> BlockSnapshot {
        self.lock().mine_block(miner)
    }

    pub fn mine_block_with(&self, miner: &str, cancel: &CancelFlag) -> Result<BlockSnapshot, MiningError> {
        self.lock().mine_block_with(miner, cancel)
    }

    pub fn register_node(&self, address: impl Into<String>) -> bool {
        self.lock().register_node(address)
    }

    pub fn latest_block(&self) -> Block {
        self.lock().latest_block().clone()
    }

    pub fn accept_block(&self, block: Block) -> Result<BlockSnapshot, LedgerError> {
        self.lock().accept_block(block).map(Block::snapshot)
    }

    pub fn block_count(&self) -> usize {
        self.lock().block_count()
    }

    pub fn snapshots(&self) -> Vec<BlockSnapshot> {
        self.lock().snapshots()
    }

    pub fn validate_chain(&self) -> Result<(), ChainError> {
        self.lock().validate_chain()
    }
}
