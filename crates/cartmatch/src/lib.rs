//! Public facade crate for `cartmatch`.
//!
//! This crate contains no IO or provider-specific logic.
//! It re-exports the backend-agnostic types/traits from `cartmatch-core`.

pub use cartmatch_core::*;
