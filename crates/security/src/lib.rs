//! Security policies for codevox tools.
//!
//! Two concerns live here:
//! - path confinement: every file path a tool touches must resolve inside
//!   the configured projects root ([`path::resolve_under_root`])
//! - command allowlisting: `run_command` only executes commands whose head
//!   is on the configured allowlist ([`allowlist::CommandAllowlist`])

pub mod allowlist;
pub mod path;

pub use allowlist::CommandAllowlist;
pub use path::{PathValidationError, resolve_under_root};
