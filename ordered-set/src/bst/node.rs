//! Partially-external BST node (C5) and its versioned descent counter.

use crate::reclaim::{Atomic, Shared};
use ordered_set_core::{Key, Value};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// `version` occupies the full counter range except for two reserved
/// sentinel values at the top, matching spec.md §3's "distinguished
/// sentinel values `UNLINKED` and `SHRINKING` occupy the counter".
const UNLINKED: u64 = u64::MAX;
const SHRINKING: u64 = u64::MAX - 1;

/// The three facts `version` can represent: a live node's ordinary
/// monotonic counter, a rotation in progress that's temporarily removing
/// this node from its subtree position (`Shrinking`), or a fully detached
/// node (`Unlinked`).
pub(crate) struct NodeVersion {
    word: AtomicU64,
}

impl NodeVersion {
    fn new() -> Self {
        Self {
            word: AtomicU64::new(0),
        }
    }

    /// Snapshot for optimistic descent validation.
    pub(crate) fn read(&self) -> u64 {
        self.word.load(Ordering::Acquire)
    }

    pub(crate) fn is_shrinking(&self) -> bool {
        self.word.load(Ordering::Acquire) == SHRINKING
    }

    pub(crate) fn is_unlinked(&self) -> bool {
        self.word.load(Ordering::Acquire) == UNLINKED
    }

    /// Bumps the ordinary counter after a structural or value change. Must
    /// be called with the node's lock held.
    pub(crate) fn bump(&self) {
        let current = self.word.load(Ordering::Acquire);
        debug_assert!(current < SHRINKING, "bump of a shrinking/unlinked node");
        self.word.store(current.wrapping_add(1), Ordering::Release);
    }

    /// Marks the start of a rotation that temporarily removes this node
    /// from its subtree position, returning the version to restore
    /// (bumped) afterwards. Must be called with the node's lock held.
    pub(crate) fn begin_shrink(&self) -> u64 {
        let current = self.word.load(Ordering::Acquire);
        debug_assert!(current < SHRINKING);
        self.word.store(SHRINKING, Ordering::Release);
        current
    }

    /// Ends a shrink, installing a version newer than `base`.
    pub(crate) fn end_shrink(&self, base: u64) {
        self.word.store(base.wrapping_add(1), Ordering::Release);
    }

    pub(crate) fn set_unlinked(&self) {
        self.word.store(UNLINKED, Ordering::Release);
    }
}

pub(crate) struct Node {
    key: AtomicU64,
    val: AtomicU64,
    pub(crate) left: Atomic<Node>,
    pub(crate) right: Atomic<Node>,
    pub(crate) parent: Atomic<Node>,
    height: AtomicI64,
    pub(crate) version: NodeVersion,
    pub(crate) lock: Mutex<()>,
}

impl Node {
    pub(crate) fn new(key: Key, val: Value, parent: Shared<'_, Node>, height: i64) -> Self {
        let parent_atomic = Atomic::null();
        parent_atomic.store(parent, Ordering::Relaxed);
        Self {
            key: AtomicU64::new(key),
            val: AtomicU64::new(val),
            left: Atomic::null(),
            right: Atomic::null(),
            parent: parent_atomic,
            height: AtomicI64::new(height),
            version: NodeVersion::new(),
            lock: Mutex::new(()),
        }
    }

    /// Sentinel used as the fixed tree root; the real tree hangs from its
    /// `right` child (spec.md §4.6.1).
    pub(crate) fn sentinel() -> Self {
        Self::new(0, 0, Shared::null(), 0)
    }

    pub(crate) fn key(&self) -> Key {
        self.key.load(Ordering::Acquire)
    }

    pub(crate) fn set_key(&self, key: Key) {
        self.key.store(key, Ordering::Release);
    }

    pub(crate) fn val(&self) -> Value {
        self.val.load(Ordering::Acquire)
    }

    pub(crate) fn set_val(&self, val: Value) {
        self.val.store(val, Ordering::Release);
    }

    pub(crate) fn height(&self) -> i64 {
        self.height.load(Ordering::Acquire)
    }

    pub(crate) fn set_height(&self, h: i64) {
        self.height.store(h, Ordering::Release);
    }

    pub(crate) fn set_parent(&self, parent: crate::reclaim::Shared<'_, Node>, _guard: &crate::reclaim::Guard) {
        self.parent.store(parent, Ordering::Release);
    }
}
