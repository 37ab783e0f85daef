//! Shared types and error handling for the concurrent ordered-set crates.
//!
//! This crate plays the same role for `ordered-set` that `ferrisdb-core`
//! plays for `ferrisdb-storage`: it carries the fundamental types and the
//! error taxonomy so that downstream crates don't each redefine them.
//!
//! - Common error types with [`Error`] and [`Result`]
//! - The [`Key`] / [`Value`] word types shared by every set implementation
//! - [`MAX_LEVEL`] and [`MAX_BACKOFF`], the two process-wide constants the
//!   skip-list families are built around
//!
//! # Example
//!
//! ```
//! use ordered_set_core::{Key, Value};
//!
//! let key: Key = 42;
//! let value: Value = 100;
//! ```

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
