//! Proof-of-work admission rule and the nonce search.
//!
//! A nonce `value` is a valid proof over the previous block's nonce
//! `last_value` when the SHA3-256 digest of their decimal renderings,
//! concatenated, starts with `difficulty` zero hex digits. Each extra digit
//! multiplies the expected search cost by 16.

use crate::constants::{CANCEL_POLL_INTERVAL, HASH_SIZE, POW_DEFAULT_DIFFICULTY, POW_MAX_DIFFICULTY};
use crate::error::MiningError;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub type Hash = [u8; HASH_SIZE];

/// Number of leading `'0'` hex digits a proof digest must have.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    pub const DEFAULT: Difficulty = Difficulty(POW_DEFAULT_DIFFICULTY);

    /// `None` outside `1..=64`.
    pub fn new(zeros: u8) -> Option<Self> {
        (1..=POW_MAX_DIFFICULTY).contains(&zeros).then_some(Difficulty(zeros))
    }

    pub fn zeros(self) -> u8 {
        self.0
    }

    pub fn is_met_by(self, digest: &Hash) -> bool {
        leading_zero_nibbles(digest) >= u32::from(self.0)
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::DEFAULT
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = String;

    fn try_from(zeros: u8) -> Result<Self, Self::Error> {
        Difficulty::new(zeros)
            .ok_or_else(|| format!("difficulty must be within 1..={POW_MAX_DIFFICULTY}, got {zeros}"))
    }
}

impl From<Difficulty> for u8 {
    fn from(difficulty: Difficulty) -> Self {
        difficulty.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn leading_zero_nibbles(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 2;
        } else {
            if *b >> 4 == 0 {
                total += 1;
            }
            break;
        }
    }
    total
}

// Writes `n` right-aligned into `buf` and returns the written digits.
fn decimal(mut n: u64, buf: &mut [u8; 20]) -> &[u8] {
    let mut start = buf.len();
    loop {
        start -= 1;
        buf[start] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    &buf[start..]
}

/// SHA3-256 over `"{value}{last_value}"`, without touching the heap.
pub fn proof_digest(value: u64, last_value: u64) -> Hash {
    let mut value_buf = [0u8; 20];
    let mut last_buf = [0u8; 20];
    let mut hasher = Sha3_256::new();
    hasher.update(decimal(value, &mut value_buf));
    hasher.update(decimal(last_value, &mut last_buf));
    let digest = hasher.finalize();
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest[..]);
    out
}

/// Admission predicate at the default difficulty.
pub fn verify_proof(value: u64, last_value: u64) -> bool {
    verify_proof_with(value, last_value, Difficulty::DEFAULT)
}

pub fn verify_proof_with(value: u64, last_value: u64, difficulty: Difficulty) -> bool {
    difficulty.is_met_by(&proof_digest(value, last_value))
}

/// Smallest nonce that is a valid proof over `last_nonce` at the default difficulty.
pub fn proof_of_work(last_nonce: u64) -> u64 {
    proof_of_work_with(last_nonce, Difficulty::DEFAULT)
}

/// Counts up from 0 until a candidate passes. Runs for as long as it takes.
pub fn proof_of_work_with(last_nonce: u64, difficulty: Difficulty) -> u64 {
    let mut candidate = 0u64;
    while !verify_proof_with(candidate, last_nonce, difficulty) {
        candidate = candidate.wrapping_add(1);
    }
    debug!(last_nonce, nonce = candidate, %difficulty, "proof of work found");
    candidate
}

/// Cooperative stop signal for a running search, optionally with a deadline.
///
/// Clones share the same flag, so one thread may cancel a search running on
/// another.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// A timeout too large to represent as an `Instant` means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::default(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Same search as [`proof_of_work_with`], giving up once `cancel` fires.
/// The flag is polled every `CANCEL_POLL_INTERVAL` candidates.
pub fn proof_of_work_cancellable(
    last_nonce: u64,
    difficulty: Difficulty,
    cancel: &CancelFlag,
) -> Result<u64, MiningError> {
    let mut candidate = 0u64;
    loop {
        if candidate % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(MiningError::Cancelled {
                last_nonce,
                attempts: candidate,
            });
        }
        if verify_proof_with(candidate, last_nonce, difficulty) {
            debug!(last_nonce, nonce = candidate, %difficulty, "proof of work found");
            return Ok(candidate);
        }
        candidate = candidate.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn difficulty(zeros: u8) -> Difficulty {
        Difficulty::new(zeros).unwrap()
    }

    #[test]
    fn leading_zero_nibbles_examples() {
        let mut h = [0u8; 32];
        assert_eq!(leading_zero_nibbles(&h), 64);
        h[0] = 0x0F;
        assert_eq!(leading_zero_nibbles(&h), 1);
        h[0] = 0xF0;
        assert_eq!(leading_zero_nibbles(&h), 0);
        h = [0u8; 32];
        h[2] = 0x01;
        assert_eq!(leading_zero_nibbles(&h), 5);
        h[2] = 0x10;
        assert_eq!(leading_zero_nibbles(&h), 4);
    }

    #[test]
    fn decimal_rendering() {
        let mut buf = [0u8; 20];
        assert_eq!(decimal(0, &mut buf), b"0");
        assert_eq!(decimal(124015, &mut buf), b"124015");
        assert_eq!(decimal(u64::MAX, &mut buf), b"18446744073709551615");
    }

    #[test]
    fn proof_digest_hashes_concatenated_decimals() {
        assert_eq!(
            hex::encode(proof_digest(0, 0)),
            "2e16aab483cb95577c50d38c8d0d7040f4672683238446c990babbca5ae133c8"
        );
        assert_eq!(
            hex::encode(proof_digest(124015, 0)),
            "0000024dbd97a9d325320a21d2ad08c59e264d16c196d9afc3ec7ca984f8c7d9"
        );
        assert_eq!(proof_digest(12, 3), proof_digest(1, 23));
    }

    #[test]
    fn zero_over_zero_is_not_a_proof() {
        assert!(!verify_proof(0, 0));
    }

    #[test]
    fn verify_proof_argument_order_matters() {
        assert!(verify_proof(124015, 0));
        assert!(!verify_proof(0, 124015));
    }

    #[test]
    fn verify_proof_respects_difficulty() {
        // digest of "13140" starts with "0001"
        assert!(verify_proof_with(1314, 0, difficulty(3)));
        assert!(!verify_proof_with(1314, 0, difficulty(4)));
    }

    #[test]
    fn proof_of_work_finds_smallest_nonce() {
        assert_eq!(proof_of_work_with(0, difficulty(1)), 4);
        assert_eq!(proof_of_work_with(1, difficulty(1)), 6);
        assert_eq!(proof_of_work_with(7, difficulty(2)), 703);
        assert_eq!(proof_of_work_with(0, difficulty(3)), 1314);
        assert_eq!(proof_of_work_with(1314, difficulty(3)), 15494);
    }

    #[test]
    fn proof_of_work_default_difficulty() {
        let nonce = proof_of_work(0);
        assert_eq!(nonce, 124015);
        assert!(verify_proof(nonce, 0));
    }

    #[test]
    fn difficulty_bounds() {
        assert!(Difficulty::new(0).is_none());
        assert!(Difficulty::new(65).is_none());
        assert_eq!(Difficulty::new(64).map(Difficulty::zeros), Some(64));
        assert_eq!(Difficulty::default().zeros(), 5);
        assert!(serde_json::from_str::<Difficulty>("0").is_err());
        assert_eq!(serde_json::from_str::<Difficulty>("3").unwrap(), difficulty(3));
    }

    #[test]
    fn cancelled_search_reports_attempts() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = proof_of_work_cancellable(0, difficulty(5), &cancel).unwrap_err();
        assert_eq!(
            err,
            MiningError::Cancelled {
                last_nonce: 0,
                attempts: 0
            }
        );
    }

    #[test]
    fn expired_deadline_cancels() {
        let cancel = CancelFlag::with_timeout(Duration::ZERO);
        assert!(cancel.is_cancelled());
        assert!(proof_of_work_cancellable(0, difficulty(64), &cancel).is_err());
    }

    #[test]
    fn unrepresentable_deadline_never_expires() {
        let cancel = CancelFlag::with_timeout(Duration::MAX);
        assert!(!cancel.is_cancelled());
        cancel.cancel();
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn uncancelled_search_matches_plain_search() {
        let cancel = CancelFlag::new();
        assert_eq!(
            proof_of_work_cancellable(7, difficulty(3), &cancel).unwrap(),
            proof_of_work_with(7, difficulty(3))
        );
    }

    #[test]
    fn clones_share_the_flag() {
        let cancel = CancelFlag::new();
        let other = cancel.clone();
        assert!(!other.is_cancelled());
        cancel.cancel();
        assert!(other.is_cancelled());
    }
}
