//! Treatment-tool detection by case-insensitive name prefix.

use crate::experiment::{RunRecord, ToolCall};

/// Matches tool names against the manifest's configured prefixes.
#[derive(Debug, Clone)]
pub struct ToolMatcher {
    prefixes: Vec<String>,
}

impl ToolMatcher {
    pub fn new<S: AsRef<str>>(prefixes: &[S]) -> Self {
        Self {
            prefixes: prefixes
                .iter()
                .map(|prefix| prefix.as_ref().trim().to_ascii_lowercase())
                .filter(|prefix| !prefix.is_empty())
                .collect(),
        }
    }

    pub fn is_treatment_tool(&self, tool_name: &str) -> bool {
        let name = tool_name.trim().to_ascii_lowercase();
        self.prefixes.iter().any(|prefix| name.starts_with(prefix))
    }

    /// Treatment-tool calls in a run, in call order.
    pub fn treatment_calls<'a>(&'a self, run: &'a RunRecord) -> impl Iterator<Item = &'a ToolCall> {
        run.tool_calls
            .iter()
            .filter(|call| self.is_treatment_tool(&call.tool_name))
    }

    pub fn used_treatment_tool(&self, run: &RunRecord) -> bool {
        self.treatment_calls(run).next().is_some()
    }

    pub fn offered_treatment_tool(&self, run: &RunRecord) -> bool {
        run.tools_offered
            .iter()
            .any(|tool| self.is_treatment_tool(tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::run_with_tools;

    #[test]
    fn matches_prefix_case_insensitively() {
        let matcher = ToolMatcher::new(&["roslyn_", "nav."]);
        assert!(matcher.is_treatment_tool("Roslyn_FindSymbol"));
        assert!(matcher.is_treatment_tool("nav.rename"));
        assert!(!matcher.is_treatment_tool("bash"));
        assert!(!matcher.is_treatment_tool("my_roslyn_tool"));
    }

    #[test]
    fn blank_prefixes_never_match() {
        let matcher = ToolMatcher::new(&["", "  "]);
        assert!(!matcher.is_treatment_tool("anything"));
    }

    #[test]
    fn detects_offered_and_used_tools() {
        let matcher = ToolMatcher::new(&["roslyn"]);
        let run = run_with_tools("r1", "t1", "treatment", &["roslyn_find"], &["bash"]);
        assert!(matcher.offered_treatment_tool(&run));
        assert!(!matcher.used_treatment_tool(&run));
    }
}
