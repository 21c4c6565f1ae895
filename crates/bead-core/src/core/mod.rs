//! Internal implementation modules for `bead-core`.
//!
//! Most callers should go through the crate root re-exports rather than
//! importing these modules directly.

pub mod commands;
pub mod config;
pub mod cursor;
pub mod row;
pub mod store;
pub mod tooling;
