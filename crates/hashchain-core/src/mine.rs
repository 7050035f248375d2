use crate::{
    constants::PARALLEL_BATCH_SIZE,
    error::MiningError,
    pow::{verify_proof_with, CancelFlag, Difficulty},
};
use rayon::prelude::*;
use tracing::debug;

/// Parallel form of the proof-of-work search.
///
/// Nonces are scanned in consecutive batches of `PARALLEL_BATCH_SIZE`; within
/// a batch rayon splits the range across threads and `find_first` keeps the
/// lowest hit, so the result is always the same nonce the sequential search
/// returns. The cancel flag is checked between batches.
pub fn proof_of_work_parallel(
    last_nonce: u64,
    difficulty: Difficulty,
    cancel: &CancelFlag,
) -> Result<u64, MiningError> {
    let mut start = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(MiningError::Cancelled {
                last_nonce,
                attempts: start,
            });
        }
        let (last, next) = batch_bounds(start);
        let found = (start..=last)
            .into_par_iter()
            .find_first(|candidate| verify_proof_with(*candidate, last_nonce, difficulty));

        if let Some(nonce) = found {
            debug!(last_nonce, nonce, %difficulty, "parallel proof of work found");
            return Ok(nonce);
        }
        start = next;
    }
}

/// Last nonce of the batch starting at `start`, and where the next batch
/// starts. The final batch ends at `u64::MAX` inclusive and the search then
/// wraps to 0, as the sequential search does.
fn batch_bounds(start: u64) -> (u64, u64) {
    let last = start.saturating_add(PARALLEL_BATCH_SIZE - 1);
    let next = last.checked_add(1).unwrap_or(0);
    (last, next)
}
