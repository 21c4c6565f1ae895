//! Request handlers behind the `bead cache` commands.

pub mod cache;

pub use cache::*;
