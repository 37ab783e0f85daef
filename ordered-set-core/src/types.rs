//! Core types shared by every concurrent ordered-set implementation.

/// A key in the set, a machine-word unsigned integer.
pub type Key = u64;

/// A value associated with a key. `0` is reserved to mean "absent" and must
/// never be stored.
pub type Value = u64;

/// Maximum tower height / tree-adjacent constant shared by the skip-list
/// families: covers up to 2^64 elements, matching `FRASER_MAX_MAX_LEVEL` /
/// `OPTIK_MAX_MAX_LEVEL` in the source this spec is drawn from.
pub const MAX_LEVEL: usize = 64;

/// Cap on the exponential backoff used after a contention-induced restart.
pub const MAX_BACKOFF: u32 = 131_071;
