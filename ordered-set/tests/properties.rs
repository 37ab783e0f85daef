//! Property-based tests shared across all three ordered-set implementations.
//!
//! Each property is checked against every family so that a divergence
//! between implementations (rather than a bug common to all three) shows
//! up as a single family failing instead of all three.

use ordered_set::{LockFreeSkipList, OptimisticSkipList, OrderedSet, RelaxedBst};
use proptest::collection::vec;
use proptest::prelude::*;

fn distinct_keys(max_len: usize) -> impl Strategy<Value = Vec<u64>> {
    vec(0u64..500, 0..max_len).prop_map(|mut keys| {
        keys.sort_unstable();
        keys.dedup();
        keys
    })
}

fn check_insert_then_find<S: OrderedSet>(keys: &[u64]) {
    let set = S::new();
    for (i, &k) in keys.iter().enumerate() {
        let value = i as u64 + 1;
        assert!(set.insert(k, value), "first insert of {k} must succeed");
    }
    for (i, &k) in keys.iter().enumerate() {
        assert_eq!(set.find(k), i as u64 + 1);
    }
    assert_eq!(set.len(), keys.len());
}

fn check_duplicate_insert_is_rejected<S: OrderedSet>(keys: &[u64]) {
    let set = S::new();
    for &k in keys {
        set.insert(k, 1);
    }
    for &k in keys {
        assert!(!set.insert(k, 2), "re-insert of live key {k} must be rejected");
        assert_eq!(set.find(k), 1, "value must be unchanged by rejected insert");
    }
}

fn check_remove_undoes_insert<S: OrderedSet>(keys: &[u64]) {
    let set = S::new();
    for (i, &k) in keys.iter().enumerate() {
        set.insert(k, i as u64 + 1);
    }
    for (i, &k) in keys.iter().enumerate() {
        assert_eq!(set.remove(k), i as u64 + 1);
        assert_eq!(set.find(k), 0, "key {k} must be gone after remove");
    }
    assert_eq!(set.len(), 0);
    assert!(set.is_empty());
}

fn check_remove_missing_is_noop<S: OrderedSet>(keys: &[u64], missing: u64) {
    let set = S::new();
    for (i, &k) in keys.iter().enumerate() {
        if k != missing {
            set.insert(k, i as u64 + 1);
        }
    }
    let len_before = set.len();
    assert_eq!(set.remove(missing), 0);
    assert_eq!(set.len(), len_before);
}

proptest! {
    #[test]
    fn lock_free_insert_then_find(keys in distinct_keys(64)) {
        check_insert_then_find::<LockFreeSkipList>(&keys);
    }

    #[test]
    fn lock_free_duplicate_insert_rejected(keys in distinct_keys(64)) {
        check_duplicate_insert_is_rejected::<LockFreeSkipList>(&keys);
    }

    #[test]
    fn lock_free_remove_undoes_insert(keys in distinct_keys(64)) {
        check_remove_undoes_insert::<LockFreeSkipList>(&keys);
    }

    #[test]
    fn lock_free_remove_missing_is_noop(keys in distinct_keys(64), missing in 500u64..1000) {
        check_remove_missing_is_noop::<LockFreeSkipList>(&keys, missing);
    }

    #[test]
    fn optimistic_insert_then_find(keys in distinct_keys(64)) {
        check_insert_then_find::<OptimisticSkipList>(&keys);
    }

    #[test]
    fn optimistic_duplicate_insert_rejected(keys in distinct_keys(64)) {
        check_duplicate_insert_is_rejected::<OptimisticSkipList>(&keys);
    }

    #[test]
    fn optimistic_remove_undoes_insert(keys in distinct_keys(64)) {
        check_remove_undoes_insert::<OptimisticSkipList>(&keys);
    }

    #[test]
    fn optimistic_remove_missing_is_noop(keys in distinct_keys(64), missing in 500u64..1000) {
        check_remove_missing_is_noop::<OptimisticSkipList>(&keys, missing);
    }

    #[test]
    fn relaxed_bst_insert_then_find(keys in distinct_keys(64)) {
        check_insert_then_find::<RelaxedBst>(&keys);
    }

    #[test]
    fn relaxed_bst_duplicate_insert_rejected(keys in distinct_keys(64)) {
        check_duplicate_insert_is_rejected::<RelaxedBst>(&keys);
    }

    #[test]
    fn relaxed_bst_remove_undoes_insert(keys in distinct_keys(64)) {
        check_remove_undoes_insert::<RelaxedBst>(&keys);
    }

    #[test]
    fn relaxed_bst_remove_missing_is_noop(keys in distinct_keys(64), missing in 500u64..1000) {
        check_remove_missing_is_noop::<RelaxedBst>(&keys, missing);
    }
}
