//! Evaluation pipeline for agent tool-usage experiments.
//!
//! An experiment compares a control arm (agent without the navigation tools)
//! against a treatment arm (agent with them) across a set of tasks. This crate
//! checks the experiment manifest and the recorded runs, scores the arms,
//! plans backfill runs, and decides whether the experiment passes its gate.
//!
//! - **[`core`]**: Pure, deterministic logic (validators, scorer, worklist,
//!   gate decision). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (document store, schema checks,
//!   config, template files). Isolated behind traits for tests.
//!
//! Orchestration modules ([`validate`], [`score`], [`worklist`], [`export`],
//! [`gate`]) coordinate core logic with I/O to implement CLI commands.

pub mod cancel;
pub mod core;
pub mod exit_codes;
pub mod experiment;
pub mod export;
pub mod gate;
pub mod io;
pub mod logging;
pub mod score;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
pub mod worklist;
