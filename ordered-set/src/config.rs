//! Configuration for the ordered-set families.
//!
//! Grounded in `ferrisdb-storage::StorageConfig`: a small, `Default`-able
//! struct of tunable parameters, with a `validate` pass that rejects
//! out-of-range values before construction.

use ordered_set_core::{Error, Result, MAX_LEVEL};

/// Configuration options shared by the skip-list families.
///
/// # Example
///
/// ```
/// use ordered_set::SetConfig;
///
/// let config = SetConfig {
///     max_level: 32,
///     seed: Some(42),
/// };
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SetConfig {
    /// Maximum tower height (`levelmax`). Treated as an immutable-after-init
    /// constant per set instance, never a mutable global, per spec.md §9.
    pub max_level: usize,

    /// Fixed RNG seed for reproducible tests and benchmarks. `None` seeds
    /// from system entropy.
    pub seed: Option<u64>,
}

impl SetConfig {
    /// Checks that `max_level` is in `[1, MAX_LEVEL]`.
    pub fn validate(&self) -> Result<()> {
        if self.max_level == 0 || self.max_level > MAX_LEVEL {
            return Err(Error::InvalidConfig(format!(
                "max_level must be in [1, {MAX_LEVEL}], got {}",
                self.max_level
            )));
        }
        Ok(())
    }
}

impl Default for SetConfig {
    fn default() -> Self {
        Self {
            max_level: MAX_LEVEL,
            seed: None,
        }
    }
}
