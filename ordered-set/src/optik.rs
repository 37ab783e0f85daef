//! Versioned lock ("OPTIK") — C3.
//!
//! A single machine word combining a lock bit and a monotonic version,
//! ported from `optik.c`'s `optik_t`/`optik_lock_version`/`optik_unlock`.
//! Bit 0 is the lock bit; bits 1..63 hold the version. Readers snapshot the
//! version before and after reading protected state and compare, without
//! ever acquiring the lock; writers acquire, mutate, and bump the version
//! on release.
//!
//! This is used directly rather than wrapped in a `parking_lot`-style RAII
//! guard: C7/C8 acquire several of these in a batch, coalesce duplicate
//! predecessors, and release them in bulk top-down or bottom-up depending
//! on the operation — a shape that doesn't fit a single lexical scope.

use std::sync::atomic::{AtomicU64, Ordering};

/// A version snapshot returned by [`VersionedLock::read`].
pub type Version = u64;

const LOCK_BIT: u64 = 1;

/// A versioned lock: one `AtomicU64` encoding a lock bit and a version.
pub struct VersionedLock {
    word: AtomicU64,
}

impl VersionedLock {
    /// Creates a new, unlocked lock at version 0.
    pub const fn new() -> Self {
        Self {
            word: AtomicU64::new(0),
        }
    }

    /// Observes the current version. Not ordered with respect to the
    /// protected data: callers must re-read and compare, as with a seqlock.
    #[inline]
    pub fn read(&self) -> Version {
        self.word.load(Ordering::Acquire) & !LOCK_BIT
    }

    /// Returns `true` iff the lock bit is currently set.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.word.load(Ordering::Acquire) & LOCK_BIT != 0
    }

    /// Acquires the lock, spinning until it succeeds. Returns `fresh =
    /// true` iff the version observed at the moment of acquisition equals
    /// `expected`; if `fresh` is `false` the caller must revalidate
    /// whatever it read under the stale snapshot before proceeding.
    ///
    /// Both outcomes leave the lock held: the caller must eventually call
    /// [`Self::unlock`] or [`Self::unlock_no_bump`].
    pub fn lock_version(&self, expected: Version) -> (bool, bool) {
        let mut attempt = 0u32;
        loop {
            let current = self.word.load(Ordering::Acquire);
            if current & LOCK_BIT == 0
                && self
                    .word
                    .compare_exchange_weak(
                        current,
                        current | LOCK_BIT,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
            {
                let fresh = (current & !LOCK_BIT) == expected;
                return (true, fresh);
            }
            attempt += 1;
            crate::backoff::backoff(attempt);
        }
    }

    /// Releases the lock and bumps the version by 2, so it never collides
    /// with the lock bit.
    #[inline]
    pub fn unlock(&self) {
        let current = self.word.load(Ordering::Acquire);
        debug_assert!(current & LOCK_BIT != 0, "unlock of a lock not held");
        self.word
            .store((current & !LOCK_BIT).wrapping_add(2), Ordering::Release);
    }

    /// Releases the lock without changing the version, for aborts that
    /// made no mutation.
    #[inline]
    pub fn unlock_no_bump(&self) {
        let current = self.word.load(Ordering::Acquire);
        debug_assert!(current & LOCK_BIT != 0, "unlock of a lock not held");
        self.word.store(current & !LOCK_BIT, Ordering::Release);
    }
}

impl Default for VersionedLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_when_version_matches() {
        let lock = VersionedLock::new();
        let v = lock.read();
        let (acquired, fresh) = lock.lock_version(v);
        assert!(acquired);
        assert!(fresh);
        lock.unlock();
        assert_eq!(lock.read(), v + 2);
    }

    #[test]
    fn stale_when_version_bumped_between_read_and_lock() {
        let lock = VersionedLock::new();
        let v = lock.read();
        lock.lock_version(v).0.then(|| lock.unlock()).unwrap();
        let (acquired, fresh) = lock.lock_version(v);
        assert!(acquired);
        assert!(!fresh);
        lock.unlock_no_bump();
    }
}
