//! Optimistic-lock skip list with version-stamped locks ("OPTIK") — C4 + C7.
//!
//! Fine-grained per-node locks whose acquisition is guarded by a version
//! read during traversal; traversal itself is lock-free and wait-free for
//! readers. Ported from
//! `examples/original_source/src/skiplist-optik/skiplist-optik.c`.

mod node;
mod set;

pub use set::OptimisticSkipList;
