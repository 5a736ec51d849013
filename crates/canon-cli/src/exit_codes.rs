//! Process exit codes.

/// Everything succeeded (skipped events are reported, not fatal).
pub const OK: i32 = 0;

/// Fatal I/O or configuration failure; the run did not complete.
pub const FATAL: i32 = 1;

/// The record failed validation.
pub const INVALID: i32 = 3;
