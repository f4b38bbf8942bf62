//! Stable exit codes for `agent-eval` commands.

/// Command succeeded (and, for `gate`, the gate passed).
pub const OK: i32 = 0;
/// Fatal error: unreadable input, schema or invariant violation, write failure.
pub const FATAL: i32 = 1;
/// `agent-eval gate` completed but the gate did not pass.
pub const GATE_FAILED: i32 = 2;
/// `validate-manifest` or `validate-runs` produced an invalid report.
pub const INVALID: i32 = 3;
/// A second Ctrl-C arrived while a cancelled run was still finishing a stage.
pub const INTERRUPTED: i32 = 130;
