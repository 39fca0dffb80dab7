/// Period of the maintenance loop (stabilize, fix_fingers,
/// check_predecessor run once per tick).
pub static STABILIZE_INTERVAL_MILLIS: u64 = 10_000;

/// Total deadline for a single peer RPC.
pub static RPC_TIMEOUT_MILLIS: u64 = 5_000;

/// Connect part of the RPC deadline.
pub static CONNECT_TIMEOUT_MILLIS: u64 = 1_000;

/// Number of successors kept for failover.
pub static SUCCESSOR_LIST_LENGTH: usize = 8;

/// Attempts made when joining through a bootstrap peer at startup.
pub static JOIN_RETRIES: u32 = 3;
pub static JOIN_RETRY_SLEEP_MILLIS: u64 = 1_000;
