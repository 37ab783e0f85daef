//! Lock-free skip list with marked pointers (C4 + C6).
//!
//! Fraser/Herlihy–Lev–Shavit style: fully non-blocking. Deletion marks each
//! level's forward pointer top-down, then physically unlinks via the
//! same traversal writers use to skip logically-deleted nodes ("help
//! clean"). Ported from `examples/original_source/src/skiplist-herlihy_lf/herlihy.c`.

mod node;
mod set;

pub use set::LockFreeSkipList;
