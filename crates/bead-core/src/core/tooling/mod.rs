//! CLI-facing diagnostics and outcome shaping.

pub mod diagnostics;
pub mod outcome;
mod response;

pub use response::{format_status_message, to_json_response};
