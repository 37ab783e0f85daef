//! Error types for the ordered-set crates.
//!
//! Only the part of the error taxonomy that can actually reach a caller is
//! represented here. `AllocationFailure`, `ContentionRetry`, and
//! `VersionMismatch` are part of the conceptual design but never surface:
//! allocation failure aborts the process (Rust's global allocator isn't
//! fallible on stable), and contention/version retries are handled
//! internally by the traversal loops in `ordered-set`.

use thiserror::Error;

/// Errors that can be produced by the public API of an ordered set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Attempted to insert the reserved "absent" value.
    ///
    /// Most call sites reject this earlier with an assertion, since `0` is
    /// a caller contract violation rather than a recoverable runtime
    /// condition; this variant exists for the few entry points (config
    /// validation, fallible test harnesses) that prefer a `Result`.
    #[error("value must be non-zero (0 is reserved to mean \"absent\")")]
    ZeroValue,

    /// A set configuration (e.g. `max_level`) was out of range.
    #[error("invalid set configuration: {0}")]
    InvalidConfig(String),
}

/// A specialized `Result` type for ordered-set operations.
pub type Result<T> = std::result::Result<T, Error>;
