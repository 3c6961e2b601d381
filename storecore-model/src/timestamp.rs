/// Unsigned 64-bit monotonic logical clock. Timestamps are externally
/// assigned by callers; this model only compares and orders them.
pub type Timestamp = u64;

/// Sentinel: "no timestamp set".
pub const NONE: Timestamp = 0;

/// Sentinel: "the most recent committed version", used by readers that
/// don't pin a specific `read_ts`.
pub const LATEST: Timestamp = u64::MAX;
