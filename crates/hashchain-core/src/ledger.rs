use crate::{
    block::{now_micros, Block, BlockSnapshot, PreviousHash, Transfer},
    constants::{MINING_REWARD, REWARD_SENDER},
    error::{BlockDefect, ChainError, LedgerError, MiningError},
    mine::proof_of_work_parallel,
    nodes::NodeRegistry,
    pow::{proof_of_work_cancellable, proof_of_work_with, verify_proof_with, CancelFlag, Difficulty},
};
use tracing::{debug, info, warn};

/// Checks `block` as the direct successor of `previous`.
///
/// Returns the first broken rule: sequential index, hash link, nonce proof,
/// then strictly increasing timestamp. The predecessor's hash is recomputed
/// here, never taken from a cache.
pub fn check_block(block: &Block, previous: &Block, difficulty: Difficulty) -> Result<(), BlockDefect> {
    let expected_index = previous
        .index()
        .checked_add(1)
        .ok_or(BlockDefect::IndexOverflow {
            previous: previous.index(),
        })?;
    if block.index() != expected_index {
        return Err(BlockDefect::IndexMismatch {
            expected: expected_index,
            found: block.index(),
        });
    }

    let previous_hash = previous.content_hash();
    if !block.hash_of_previous_block().links_to(&previous_hash) {
        return Err(BlockDefect::BrokenLink {
            expected: previous_hash,
            found: block.hash_of_previous_block().to_string(),
        });
    }

    if !verify_proof_with(block.nonce(), previous.nonce(), difficulty) {
        return Err(BlockDefect::InvalidProof {
            nonce: block.nonce(),
            last_nonce: previous.nonce(),
        });
    }

    if block.timestamp() <= previous.timestamp() {
        return Err(BlockDefect::StaleTimestamp {
            timestamp: block.timestamp(),
            previous: previous.timestamp(),
        });
    }

    Ok(())
}

/// Validates a whole sequence: a well-formed genesis first, then every
/// adjacent pair through [`check_block`].
pub fn validate_blocks(blocks: &[Block], difficulty: Difficulty) -> Result<(), ChainError> {
    let genesis = blocks.first().ok_or(ChainError::EmptyChain)?;
    if genesis.index() != 0 {
        return Err(ChainError::MalformedGenesis {
            reason: format!("index is {}", genesis.index()),
        });
    }
    if genesis.nonce() != 0 {
        return Err(ChainError::MalformedGenesis {
            reason: format!("nonce is {}", genesis.nonce()),
        });
    }
    if *genesis.hash_of_previous_block() != PreviousHash::Genesis {
        return Err(ChainError::MalformedGenesis {
            reason: format!("previous hash is {}", genesis.hash_of_previous_block()),
        });
    }

    for (offset, pair) in blocks.windows(2).enumerate() {
        check_block(&pair[1], &pair[0], difficulty).map_err(|defect| ChainError::InvalidBlock {
            index: offset + 1,
            defect,
        })?;
    }
    Ok(())
}

/// The chain plus its staging area.
///
/// The chain always starts with the genesis block and only grows. Transfers
/// staged with [`Ledger::stage_data`] wait in the pending buffer until the
/// next seal moves them into a block.
#[derive(Clone, Debug)]
pub struct Ledger {
    chain: Vec<Block>,
    pending_data: Vec<Transfer>,
    nodes: NodeRegistry,
    difficulty: Difficulty,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_difficulty(Difficulty::DEFAULT)
    }

    pub fn with_difficulty(difficulty: Difficulty) -> Self {
        let mut ledger = Self {
            chain: Vec::new(),
            pending_data: Vec::new(),
            nodes: NodeRegistry::new(),
            difficulty,
        };
        ledger.create_genesis_block();
        ledger
    }

    fn create_genesis_block(&mut self) {
        self.seal_block(0, PreviousHash::Genesis);
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn block_count(&self) -> usize {
        self.chain.len()
    }

    pub fn pending_data(&self) -> &[Transfer] {
        &self.pending_data
    }

    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    pub fn snapshots(&self) -> Vec<BlockSnapshot> {
        self.chain.iter().map(Block::snapshot).collect()
    }

    /// Last block of the chain.
    ///
    /// # Panics
    /// Only if the chain is empty, which construction rules out.
    pub fn latest_block(&self) -> &Block {
        self.chain
            .last()
            .expect("ledger chain always holds the genesis block")
    }

    /// Appends a block at the next index carrying every pending transfer.
    ///
    /// The stamp is the current time, bumped to one microsecond past the
    /// tail when the clock has not moved on.
    pub fn seal_block(&mut self, nonce: u64, hash_of_previous_block: PreviousHash) -> &Block {
        let index = self.chain.len() as u64;
        let now = now_micros();
        let timestamp = match self.chain.last() {
            Some(tail) => now.max(tail.timestamp().saturating_add(1)),
            None => now,
        };
        let data = std::mem::take(&mut self.pending_data);
        let block = Block::with_timestamp(index, nonce, hash_of_previous_block, data, timestamp);
        info!(
            index,
            nonce,
            transfers = block.data().len(),
            "sealed block"
        );
        self.chain.push(block);
        self.latest_block()
    }

    /// Queues a transfer for the next block. Nothing is validated.
    pub fn stage_data(&mut self, sender: impl Into<String>, recipient: impl Into<String>, quantity: u64) -> bool {
        let transfer = Transfer::new(sender, recipient, quantity);
        debug!(%transfer, pending = self.pending_data.len() + 1, "staged transfer");
        self.pending_data.push(transfer);
        true
    }

    /// Stages the miner's reward, searches for a proof over the tail's nonce
    /// and seals the next block.
    pub fn mine_block(&mut self, miner: &str) -> BlockSnapshot {
        self.stage_data(REWARD_SENDER, miner, MINING_REWARD);
        let last_nonce = self.latest_block().nonce();
        let nonce = proof_of_work_with(last_nonce, self.difficulty);
        let previous_hash = self.latest_block().content_hash();
        self.seal_block(nonce, PreviousHash::Digest(previous_hash))
            .snapshot()
    }

    /// Like [`Ledger::mine_block`] but stoppable through `cancel`.
    ///
    /// The reward is staged only once a proof is found, so a cancelled call
    /// leaves the ledger exactly as it was.
    pub fn mine_block_with(&mut self, miner: &str, cancel: &CancelFlag) -> Result<BlockSnapshot, MiningError> {
        let last_nonce = self.latest_block().nonce();
        let nonce = proof_of_work_cancellable(last_nonce, self.difficulty, cancel)?;
        Ok(self.seal_mined(miner, nonce))
    }

    /// Like [`Ledger::mine_block_with`], searching on the rayon pool.
    pub fn mine_block_parallel(&mut self, miner: &str, cancel: &CancelFlag) -> Result<BlockSnapshot, MiningError> {
        let last_nonce = self.latest_block().nonce();
        let nonce = proof_of_work_parallel(last_nonce, self.difficulty, cancel)?;
        Ok(self.seal_mined(miner, nonce))
    }

    fn seal_mined(&mut self, miner: &str, nonce: u64) -> BlockSnapshot {
        self.stage_data(REWARD_SENDER, miner, MINING_REWARD);
        let previous_hash = self.latest_block().content_hash();
        self.seal_block(nonce, PreviousHash::Digest(previous_hash))
            .snapshot()
    }

    pub fn check_block(&self, block: &Block, previous: &Block) -> Result<(), BlockDefect> {
        check_block(block, previous, self.difficulty)
    }

    pub fn check_block_validity(&self, block: &Block, previous: &Block) -> bool {
        self.check_block(block, previous).is_ok()
    }

    pub fn validate_chain(&self) -> Result<(), ChainError> {
        let result = validate_blocks(&self.chain, self.difficulty);
        if let Err(err) = &result {
            warn!(%err, "chain failed validation");
        }
        result
    }

    pub fn is_chain_valid(&self) -> bool {
        self.validate_chain().is_ok()
    }

    /// Rebuilds a block from imported fields without validating it.
    pub fn reconstruct_block(fields: BlockSnapshot) -> Block {
        Block::from_snapshot(fields)
    }

    /// Appends an externally built block if it is a valid successor of the
    /// current tail. Pending data is left alone.
    pub fn accept_block(&mut self, block: Block) -> Result<&Block, LedgerError> {
        if let Err(defect) = self.check_block(&block, self.latest_block()) {
            warn!(index = block.index(), %defect, "rejected block");
            return Err(LedgerError::Rejected {
                index: block.index(),
                defect,
            });
        }
        info!(index = block.index(), nonce = block.nonce(), "accepted block");
        self.chain.push(block);
        Ok(self.latest_block())
    }

    /// Records a peer address. Always succeeds; repeats are ignored.
    pub fn register_node(&mut self, address: impl Into<String>) -> bool {
        let address = address.into();
        if self.nodes.register(address.clone()) {
            debug!(%address, "registered node");
        }
        true
    }
}
