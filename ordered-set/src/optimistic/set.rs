//! `OptimisticSkipList` — C7.

use super::node::{Node, NodeKey, State};
use crate::backoff::{self, LevelRng};
use crate::config::SetConfig;
use crate::optik::Version;
use crate::reclaim::{pin, retire, Atomic, Guard, Owned, Shared};
use crate::set::{assert_nonzero_value, OrderedSet};
use ordered_set_core::{Key, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Result of a top-down traversal (spec.md §4.5.2): predecessors,
/// successors, and the predecessor version observed at each level, plus the
/// level at which a matching key was last seen (if any — by tower
/// completeness this is level 0 whenever the key is present).
struct Traversal<'g> {
    preds: Vec<Shared<'g, Node>>,
    succs: Vec<Shared<'g, Node>>,
    preds_version: Vec<Version>,
    found: bool,
    found_version: Version,
}

/// A skip list whose readers never lock and never CAS: writers serialize on
/// per-node versioned locks, and readers detect a concurrent writer by
/// comparing version snapshots instead of acquiring anything.
///
/// Linearization points (spec.md §4.5): insert linearizes when the new
/// node transitions to `Valid`; remove linearizes when the target
/// transitions to `Unlinking`; find linearizes at the read of the located
/// node's value, gated on it being `Valid`.
pub struct OptimisticSkipList {
    head: Atomic<Node>,
    max_level: usize,
    rng: LevelRng,
    len: AtomicUsize,
}

impl OptimisticSkipList {
    /// Creates a new empty set with the given configuration.
    pub fn with_config(config: SetConfig) -> Self {
        config.validate().expect("invalid SetConfig");
        let head = Node::head(config.max_level);
        let tail = Node::tail(config.max_level);
        {
            let guard = &pin();
            let tail_shared = Owned::new(tail).into_shared(guard);
            for slot in head.next.iter() {
                slot.store(tail_shared, Ordering::Relaxed);
            }
        }
        let rng = match config.seed {
            Some(seed) => LevelRng::with_seed(config.max_level, seed),
            None => LevelRng::new(config.max_level),
        };
        Self {
            head: Atomic::new(head),
            max_level: config.max_level,
            rng,
            len: AtomicUsize::new(0),
        }
    }

    fn traverse<'g>(&self, key: NodeKey, guard: &'g Guard) -> Traversal<'g> {
        loop {
            let mut preds = vec![Shared::null(); self.max_level];
            let mut succs = vec![Shared::null(); self.max_level];
            let mut preds_version = vec![0u64; self.max_level];
            let mut found = false;
            let mut found_version = 0u64;
            let mut restart = false;

            let mut pred = self.head.load(Ordering::Acquire, guard);
            let mut pred_version = unsafe { pred.deref() }.lock.read();

            for level in (0..self.max_level).rev() {
                let mut curr = unsafe { pred.deref() }.next[level].load(Ordering::Acquire, guard);
                while unsafe { curr.deref() }.key < key {
                    pred = curr;
                    pred_version = unsafe { pred.deref() }.lock.read();
                    curr = unsafe { pred.deref() }.next[level].load(Ordering::Acquire, guard);
                }

                let pred_ref = unsafe { pred.deref() };
                if pred_ref.is_unlinking() || pred_ref.lock.read() != pred_version {
                    restart = true;
                    break;
                }

                preds[level] = pred;
                succs[level] = curr;
                preds_version[level] = pred_version;
                let curr_ref = unsafe { curr.deref() };
                if curr_ref.key == key {
                    found = true;
                    found_version = curr_ref.lock.read();
                }
            }

            if restart {
                continue;
            }

            return Traversal {
                preds,
                succs,
                preds_version,
                found,
                found_version,
            };
        }
    }

    /// Acquires `preds[0..height]`'s locks bottom-up, coalescing adjacent
    /// duplicate predecessors, revalidating each on a stale (non-`fresh`)
    /// acquisition. Returns the distinct locks held (for later release) on
    /// success, or releases everything it grabbed and returns `None` on
    /// failure.
    fn lock_preds<'g>(
        &self,
        result: &Traversal<'g>,
        height: usize,
        guard: &'g Guard,
    ) -> Option<Vec<Shared<'g, Node>>> {
        let mut locked: Vec<Shared<'g, Node>> = Vec::new();
        for i in 0..height {
            let pred = result.preds[i];
            if locked.last() == Some(&pred) {
                continue;
            }
            let pred_ref = unsafe { pred.deref() };
            let (_, fresh) = pred_ref.lock.lock_version(result.preds_version[i]);
            if !fresh {
                let succ_still_next = pred_ref.next[i].load(Ordering::Acquire, guard) == result.succs[i];
                let succ_ok = !unsafe { result.succs[i].deref() }.is_unlinking();
                if pred_ref.is_unlinking() || !succ_still_next || !succ_ok {
                    pred_ref.lock.unlock_no_bump();
                    for held in locked.iter().rev() {
                        unsafe { held.deref() }.lock.unlock_no_bump();
                    }
                    return None;
                }
            }
            locked.push(pred);
        }
        Some(locked)
    }
}

impl OrderedSet for OptimisticSkipList {
    fn new() -> Self {
        Self::with_config(SetConfig::default())
    }

    fn find(&self, key: Key) -> Value {
        let guard = &pin();
        let nk = NodeKey::Real(key);
        let mut pred = self.head.load(Ordering::Acquire, guard);
        for level in (0..self.max_level).rev() {
            let mut curr = unsafe { pred.deref() }.next[level].load(Ordering::Acquire, guard);
            while unsafe { curr.deref() }.key < nk {
                pred = curr;
                curr = unsafe { pred.deref() }.next[level].load(Ordering::Acquire, guard);
            }
            let curr_ref = unsafe { curr.deref() };
            if curr_ref.key == nk {
                return if curr_ref.is_valid() { curr_ref.val } else { 0 };
            }
        }
        0
    }

    fn insert(&self, key: Key, value: Value) -> bool {
        assert_nonzero_value(value);
        let nk = NodeKey::Real(key);
        let height = self.rng.random_level();
        let guard = &pin();
        let mut attempt = 0u32;

        'restart: loop {
            let result = self.traverse(nk, guard);
            if result.found {
                let found_node = result.succs[0];
                let found_ref = unsafe { found_node.deref() };
                match found_ref.state() {
                    State::Valid => return false,
                    State::Linking => {
                        // Wait for the concurrent insert to finish publishing.
                        let mut wait_attempt = 0u32;
                        while found_ref.is_linking() {
                            wait_attempt += 1;
                            backoff::backoff(wait_attempt);
                        }
                        if found_ref.is_valid() {
                            return false;
                        }
                        attempt += 1;
                        backoff::backoff(attempt);
                        continue 'restart;
                    }
                    State::Unlinking | State::Unlinked => {
                        attempt += 1;
                        backoff::backoff(attempt);
                        continue 'restart;
                    }
                }
            }

            let Some(locked) = self.lock_preds(&result, height, guard) else {
                attempt += 1;
                backoff::backoff(attempt);
                continue 'restart;
            };

            let mut new_node = Owned::new(Node::new(nk, value, height, State::Linking));
            for i in 0..height {
                new_node.next[i].store(result.succs[i], Ordering::Relaxed);
            }
            let new_shared = new_node.into_shared(guard);

            for i in 0..height {
                unsafe { result.preds[i].deref() }.next[i].store(new_shared, Ordering::Release);
            }
            unsafe { new_shared.deref() }.set_valid();

            for pred in locked.iter().rev() {
                unsafe { pred.deref() }.lock.unlock();
            }

            self.len.fetch_add(1, Ordering::Relaxed);
            return true;
        }
    }

    fn remove(&self, key: Key) -> Value {
        let nk = NodeKey::Real(key);
        let guard = &pin();
        let mut attempt = 0u32;

        'restart: loop {
            let result = self.traverse(nk, guard);
            if !result.found {
                return 0;
            }

            let node = result.succs[0];
            let node_ref = unsafe { node.deref() };
            match node_ref.state() {
                State::Unlinking | State::Unlinked => return 0,
                State::Linking => {
                    attempt += 1;
                    backoff::backoff(attempt);
                    continue 'restart;
                }
                State::Valid => {}
            }

            let (_, fresh) = node_ref.lock.lock_version(result.found_version);
            if !fresh {
                if node_ref.is_unlinking() {
                    node_ref.lock.unlock_no_bump();
                    return 0;
                }
                node_ref.lock.unlock_no_bump();
                attempt += 1;
                backoff::backoff(attempt);
                continue 'restart;
            }
            node_ref.set_unlinking();

            let height = node_ref.toplevel();
            let Some(locked) = self.lock_preds(&result, height, guard) else {
                node_ref.set_valid();
                node_ref.lock.unlock_no_bump();
                attempt += 1;
                backoff::backoff(attempt);
                continue 'restart;
            };

            for i in (0..height).rev() {
                let succ = node_ref.next[i].load(Ordering::Acquire, guard);
                unsafe { result.preds[i].deref() }.next[i].store(succ, Ordering::Release);
            }

            let val = node_ref.val;
            node_ref.set_unlinked();
            node_ref.lock.unlock();
            for pred in locked.iter().rev() {
                unsafe { pred.deref() }.lock.unlock();
            }

            unsafe {
                retire(guard, node);
            }
            self.len.fetch_sub(1, Ordering::Relaxed);
            return val;
        }
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }
}

impl Default for OptimisticSkipList {
    fn default() -> Self {
        <Self as OrderedSet>::new()
    }
}

impl Drop for OptimisticSkipList {
    fn drop(&mut self) {
        let guard = &pin();
        let mut curr = self.head.load(Ordering::Acquire, guard);
        loop {
            let next = unsafe { curr.deref() }.next[0].load(Ordering::Acquire, guard);
            let is_tail = unsafe { curr.deref() }.key == NodeKey::PosInf;
            unsafe {
                retire(guard, curr);
            }
            if is_tail || next.is_null() {
                break;
            }
            curr = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn set() -> OptimisticSkipList {
        OptimisticSkipList::with_config(SetConfig {
            max_level: 8,
            seed: Some(11),
        })
    }

    #[test]
    fn s1_sequential_sanity() {
        let s = set();
        for k in (1..=8).rev() {
            assert!(s.insert(k, k));
        }
        assert_eq!(s.remove(5), 5);
        assert_eq!(s.remove(3), 3);
        assert_eq!(s.remove(2), 2);
        assert_eq!(s.remove(1), 1);

        assert_eq!(s.find(3), 0);
        assert_eq!(s.find(4), 4);
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn s2_duplicate_insert() {
        let s = set();
        assert!(s.insert(10, 100));
        assert!(!s.insert(10, 200));
        assert_eq!(s.find(10), 100);
    }

    #[test]
    fn s3_remove_missing() {
        let s = set();
        assert_eq!(s.remove(42), 0);
    }

    #[test]
    fn s4_remove_then_reinsert() {
        let s = set();
        s.insert(5, 1);
        assert_eq!(s.remove(5), 1);
        assert_eq!(s.find(5), 0);
        assert!(s.insert(5, 2));
        assert_eq!(s.find(5), 2);
    }

    #[test]
    fn s6_tower_completeness() {
        let s = set();
        for k in 1..200u64 {
            s.insert(k, k);
        }
        for k in (1..200u64).step_by(3) {
            s.remove(k);
        }
        for k in 1..200u64 {
            let present = k % 3 != 1;
            assert_eq!(s.find(k) != 0, present, "key {k}");
        }
    }

    #[test]
    fn s5_concurrent_contention() {
        let s = Arc::new(set());
        let mut handles = Vec::new();
        for t in 0..8u64 {
            let s = Arc::clone(&s);
            handles.push(thread::spawn(move || {
                for i in 0..200u64 {
                    let k = (t * 1000 + i) % 1024;
                    match i % 5 {
                        0 | 1 => {
                            let _ = s.insert(k, k + 1);
                        }
                        2 => {
                            let _ = s.remove(k);
                        }
                        _ => {
                            let _ = s.find(k);
                        }
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let mut last = None;
        for k in 0..1024u64 {
            let v = s.find(k);
            if v != 0 {
                assert!(last.map_or(true, |l| l < k));
                last = Some(k);
            }
        }
    }

    #[test]
    fn insert_rejects_zero_value() {
        let s = set();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| s.insert(1, 0)));
        assert!(result.is_err());
    }
}
