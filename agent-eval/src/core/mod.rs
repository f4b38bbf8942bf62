//! Deterministic, pure logic for the evaluation pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! manifests and run records and return deterministic outputs suitable for
//! tests. The one filesystem question (prompt-file existence) is asked
//! through [`types::PathProbe`].

pub mod gate;
pub mod manifest_checks;
pub mod run_checks;
pub mod scoring;
pub mod tool_match;
pub mod types;
pub mod worklist;
