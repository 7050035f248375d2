use crate::error::SnapshotError;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// One transfer record carried in a block's data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub sender: String,
    pub recipient: String,
    pub quantity: u64,
}

impl Transfer {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, quantity: u64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            quantity,
        }
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.sender, self.recipient, self.quantity)
    }
}

/// Reference from a block to its predecessor.
///
/// The genesis block has no predecessor and carries the integer sentinel `0`,
/// which is also how it serializes. Every other block carries the hex content
/// hash of the block before it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PreviousHashRepr", into = "PreviousHashRepr")]
pub enum PreviousHash {
    Genesis,
    Digest(String),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PreviousHashRepr {
    Sentinel(u64),
    Digest(String),
}

impl TryFrom<PreviousHashRepr> for PreviousHash {
    type Error = SnapshotError;

    fn try_from(repr: PreviousHashRepr) -> Result<Self, Self::Error> {
        match repr {
            PreviousHashRepr::Sentinel(0) => Ok(PreviousHash::Genesis),
            PreviousHashRepr::Sentinel(other) => Err(SnapshotError::BadSentinel(other)),
            PreviousHashRepr::Digest(hex) => Ok(PreviousHash::Digest(hex)),
        }
    }
}

impl From<PreviousHash> for PreviousHashRepr {
    fn from(prev: PreviousHash) -> Self {
        match prev {
            PreviousHash::Genesis => PreviousHashRepr::Sentinel(0),
            PreviousHash::Digest(hex) => PreviousHashRepr::Digest(hex),
        }
    }
}

impl PreviousHash {
    pub fn digest(hex: impl Into<String>) -> Self {
        PreviousHash::Digest(hex.into())
    }

    /// True when this reference points at a block whose content hash is `hash`.
    /// The genesis sentinel matches nothing.
    pub fn links_to(&self, hash: &str) -> bool {
        match self {
            PreviousHash::Genesis => false,
            PreviousHash::Digest(hex) => hex == hash,
        }
    }
}

impl fmt::Display for PreviousHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviousHash::Genesis => f.write_str("0"),
            PreviousHash::Digest(hex) => f.write_str(hex),
        }
    }
}

/// Microseconds since the Unix epoch. A clock set before 1970 reads as 0.
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Plain field-for-field copy of a [`Block`], used to hand blocks across the
/// crate boundary (JSON export, import through [`Block::from_snapshot`]).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSnapshot {
    pub index: u64,
    pub nonce: u64,
    pub hash_of_previous_block: PreviousHash,
    pub data: Vec<Transfer>,
    pub timestamp: u64,
}

impl BlockSnapshot {
    pub fn from_json(line: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(line)?)
    }
}

/// A sealed block. Fields are fixed at construction and only readable afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BlockSnapshot", into = "BlockSnapshot")]
pub struct Block {
    index: u64,
    nonce: u64,
    hash_of_previous_block: PreviousHash,
    data: Vec<Transfer>,
    timestamp: u64,
}

impl Block {
    /// Builds a block stamped with the current wall-clock time.
    pub fn new(
        index: u64,
        nonce: u64,
        hash_of_previous_block: PreviousHash,
        data: Vec<Transfer>,
    ) -> Self {
        Self::with_timestamp(index, nonce, hash_of_previous_block, data, now_micros())
    }

    pub fn with_timestamp(
        index: u64,
        nonce: u64,
        hash_of_previous_block: PreviousHash,
        data: Vec<Transfer>,
        timestamp: u64,
    ) -> Self {
        Self {
            index,
            nonce,
            hash_of_previous_block,
            data,
            timestamp,
        }
    }

    /// Rebuilds a block from externally supplied fields. No validity check is
    /// made here; run the ledger's block check against its tail before
    /// accepting the result.
    pub fn from_snapshot(snapshot: BlockSnapshot) -> Self {
        Self::with_timestamp(
            snapshot.index,
            snapshot.nonce,
            snapshot.hash_of_previous_block,
            snapshot.data,
            snapshot.timestamp,
        )
    }

    pub fn snapshot(&self) -> BlockSnapshot {
        self.clone().into()
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash_of_previous_block(&self) -> &PreviousHash {
        &self.hash_of_previous_block
    }

    pub fn data(&self) -> &[Transfer] {
        &self.data
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Index, nonce, previous hash, data (compact JSON) and timestamp,
    /// concatenated in that order with no separators.
    pub fn canonical_string(&self) -> String {
        let data = serde_json::to_string(&self.data).expect("transfer records always serialize");
        format!(
            "{}{}{}{}{}",
            self.index, self.nonce, self.hash_of_previous_block, data, self.timestamp
        )
    }

    /// SHA3-256 of the canonical string, lowercase hex. Recomputed on every call.
    pub fn content_hash(&self) -> String {
        hex::encode(Sha3_256::digest(self.canonical_string().as_bytes()))
    }
}

impl From<BlockSnapshot> for Block {
    fn from(snapshot: BlockSnapshot) -> Self {
        Block::from_snapshot(snapshot)
    }
}

impl From<Block> for BlockSnapshot {
    fn from(block: Block) -> Self {
        BlockSnapshot {
            index: block.index,
            nonce: block.nonce,
            hash_of_previous_block: block.hash_of_previous_block,
            data: block.data,
            timestamp: block.timestamp,
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - {} - [",
            self.index, self.nonce, self.hash_of_previous_block
        )?;
        for (i, transfer) in self.data.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{transfer}")?;
        }
        write!(f, "] - {}", self.timestamp)
    }
}
