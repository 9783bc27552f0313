//! LSP protocol feature implementations.
//!
//! This module provides:
//! - Diagnostics from decode errors and advisory lint checks
//! - The `workspace/executeCommand` surface for structural edits and queries

pub mod commands;
mod diagnostics;
mod lint;

pub use commands::{execute, parse, Command, CommandError, Invocation, Outcome, ALL_COMMANDS};
pub use diagnostics::{to_diagnostics, DIAGNOSTIC_SOURCE};
pub use lint::{lint, LintIssue, LintLevel};
