//! Pass/fail gate decision over validation and scoring outcomes.

/// Inputs the gate decision depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateInputs<'a> {
    pub manifest_valid: bool,
    pub manifest_error_count: usize,
    pub runs_valid: bool,
    pub run_error_count: usize,
    pub run_warning_count: usize,
    pub sufficient_data: bool,
    /// Explanation carried by an insufficient comparison.
    pub insufficiency_note: Option<&'a str>,
    pub fail_on_run_warnings: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub gate_passed: bool,
    /// One entry per failing condition, in a fixed order.
    pub notes: Vec<String>,
}

/// `manifest_valid && runs_valid && sufficient_data && (!fail_on_run_warnings || warnings == 0)`.
pub fn decide(inputs: &GateInputs<'_>) -> GateDecision {
    let warnings_block = inputs.fail_on_run_warnings && inputs.run_warning_count > 0;
    let gate_passed =
        inputs.manifest_valid && inputs.runs_valid && inputs.sufficient_data && !warnings_block;

    let mut notes = Vec::new();
    if !inputs.manifest_valid {
        notes.push(format!(
            "manifest validation failed with {} error(s)",
            inputs.manifest_error_count
        ));
    }
    if !inputs.runs_valid {
        notes.push(format!(
            "run validation failed with {} error(s)",
            inputs.run_error_count
        ));
    }
    if !inputs.sufficient_data {
        notes.push(format!(
            "insufficient data: {}",
            inputs
                .insufficiency_note
                .unwrap_or("control and treatment each need at least one run")
        ));
    }
    if warnings_block {
        notes.push(format!(
            "hard failures: {} run validation warning(s) with fail_on_run_warnings enabled",
            inputs.run_warning_count
        ));
    }

    GateDecision { gate_passed, notes }
}
