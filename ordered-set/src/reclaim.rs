//! Safe memory reclamation substrate (C1).
//!
//! Every set family allocates nodes on the heap at insert time and retires
//! them to this module once they've been physically unlinked. The contract
//! is the one spec.md §4.1 describes: a retired pointer's memory is not
//! reused while any thread may still hold a reference acquired before the
//! retirement. We get that contract from `crossbeam`'s epoch-based
//! reclamation, the same mechanism `ferrisdb-storage`'s skip list already
//! uses (`crossbeam::epoch::{pin, Guard}`, `Guard::defer_destroy`).
//!
//! Simply freeing a node on unlink is incorrect here and will ABA-corrupt
//! concurrent traversals — this module exists precisely to rule that out.

use crossbeam::epoch;

pub use crossbeam::epoch::{Atomic, Guard, Owned, Shared};

/// Enters a reclamation epoch for the current thread. Must be held for the
/// duration of any operation that dereferences a `Shared<Node>`.
#[inline]
pub fn pin() -> Guard {
    epoch::pin()
}

/// Retires a physically-unlinked node: its memory becomes eligible for
/// reuse only after every thread that could have observed it has since
/// passed a safe point.
///
/// # Safety
///
/// `node` must already be physically unreachable from every set it was
/// part of — no live traversal may still find its way to it.
#[inline]
pub unsafe fn retire<T>(guard: &Guard, node: Shared<'_, T>) {
    guard.defer_destroy(node);
}
