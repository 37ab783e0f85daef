//! The shared external contract every set family implements (spec.md §6).

use ordered_set_core::{Key, Value};

/// An ordered set of integer keys mapping to non-zero values.
///
/// `0` is reserved to mean "absent" in return positions; inserting `0` is a
/// caller contract violation, not a recoverable error, so every
/// implementation panics rather than
/// returning a `Result` — this keeps `insert`'s signature matching the one
/// spec.md's external-interface table specifies (`Output: bool`,
/// `Errors: none`).
pub trait OrderedSet: Send + Sync {
    /// Creates a new, empty set with default configuration.
    fn new() -> Self
    where
        Self: Sized;

    /// Returns the value associated with `key`, or `0` if absent.
    fn find(&self, key: Key) -> Value;

    /// Inserts `key` with `value` if `key` is not already present.
    ///
    /// Returns `true` iff the key was newly inserted. Panics if `value` is
    /// `0`.
    fn insert(&self, key: Key, value: Value) -> bool;

    /// Removes `key` if present, returning its value, or `0` if absent.
    fn remove(&self, key: Key) -> Value;

    /// The number of live entries, a strong (exact) count maintained by an
    /// atomic counter bumped on every successful insert/remove.
    fn len(&self) -> usize;

    /// Returns `true` iff the set has no live entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Asserts the precondition every `insert` implementation shares: `0` is
/// reserved and must never be stored.
#[inline]
pub(crate) fn assert_nonzero_value(value: Value) {
    assert_ne!(
        value, 0,
        "value must be non-zero (0 is reserved to mean \"absent\")"
    );
}
