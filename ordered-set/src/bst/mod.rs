//! Relaxed-balance internal BST (C5 + C8).
//!
//! A partially-external binary search tree: a fixed sentinel root whose
//! `right` child is the real tree. Descent is optimistic and
//! version-validated like the two skip-list families; structural changes
//! (attach, detach, rotation) are serialized per-node with a plain lock.
//! Rebalancing is best-effort AVL fixup run from the edited node up to the
//! root after every insert/remove, so balance may lag briefly under
//! concurrent load rather than being restored atomically with the edit —
//! the relaxed-balance behavior spec.md §4.6 calls for. Grounded in the
//! general shape of Bronson et al.'s optimistic concurrent AVL tree; no
//! reference C source ships in this pack for this algorithm, unlike the
//! two skip lists.

mod node;
mod set;

pub use set::RelaxedBst;
