pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const POW_DEFAULT_DIFFICULTY: u8 = 5;
pub const POW_MAX_DIFFICULTY: u8 = HASH_HEX_SIZE as u8;
/// Sender recorded on the reward entry of every mined block.
pub const REWARD_SENDER: &str = "0";
pub const MINING_REWARD: u64 = 1;
/// Candidates tried between two looks at a `CancelFlag`.
pub const CANCEL_POLL_INTERVAL: u64 = 4096;
pub const PARALLEL_BATCH_SIZE: u64 = 1 << 16;
