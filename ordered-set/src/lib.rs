//! Concurrent ordered sets keyed by `u64`
//!
//! Three interchangeable implementations of the same external contract
//! (`OrderedSet`), each trading off differently between read concurrency,
//! write concurrency, and structural complexity:
//!
//! - **Lock-free skip list**: fully non-blocking, Fraser/Herlihy–Lev–Shavit
//!   style marked-pointer deletion.
//! - **Optimistic-lock skip list**: version-stamped per-node locks
//!   ("OPTIK"); reads are lock-free, writers lock only the nodes they
//!   touch.
//! - **Relaxed-balance BST**: an internal binary search tree with
//!   best-effort AVL rebalancing that may lag briefly under concurrent
//!   load.
//!
//! # Example
//!
//! ```
//! use ordered_set::{LockFreeSkipList, OrderedSet};
//!
//! let set = LockFreeSkipList::new();
//! assert!(set.insert(1, 100));
//! assert_eq!(set.find(1), 100);
//! assert_eq!(set.remove(1), 100);
//! ```

pub mod backoff;
pub mod bst;
pub mod config;
pub mod lockfree;
pub mod optik;
pub mod optimistic;
pub mod reclaim;
pub mod set;

pub use bst::RelaxedBst;
pub use config::SetConfig;
pub use lockfree::LockFreeSkipList;
pub use optimistic::OptimisticSkipList;
pub use set::OrderedSet;
