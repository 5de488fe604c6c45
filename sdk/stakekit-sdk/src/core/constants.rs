/// Total attempts per network call (the first try plus one retry).
pub const DEFAULT_RETRY_ATTEMPTS: usize = 2;
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 400;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 2_000;
pub const DEFAULT_RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Minimum interval between completed balance refreshes for one owner.
pub const DEFAULT_BALANCE_DEBOUNCE_MS: u64 = 10_000;

pub const DEFAULT_CONFIRM_POLL_INTERVAL_MS: u64 = 500;
/// Consecutive polls without block height progress before confirmation
/// gives up. The blockhash expiry height is the real deadline.
pub const DEFAULT_CONFIRM_MAX_POLLS: u32 = 120;

pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;
pub const DEFAULT_SETTLE_ATTEMPTS: u32 = 5;

/// Capacity of the status event channel handed to UI observers.
pub const STATUS_CHANNEL_CAPACITY: usize = 64;
