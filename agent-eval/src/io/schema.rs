//! Embedded JSON Schemas for input documents.

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::Validator;
use serde_json::Value;

const MANIFEST_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/manifest/v1.schema.json"
));
const RUN_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/run/v1.schema.json"
));

/// A compiled schema plus the label used in error messages.
pub struct DocumentSchema {
    label: &'static str,
    validator: Validator,
}

impl DocumentSchema {
    pub fn manifest() -> Result<Self> {
        Self::compile("manifest", MANIFEST_SCHEMA)
    }

    pub fn run() -> Result<Self> {
        Self::compile("run", RUN_SCHEMA)
    }

    fn compile(label: &'static str, raw: &str) -> Result<Self> {
        let schema: Value =
            serde_json::from_str(raw).with_context(|| format!("parse {label} schema"))?;
        let validator = jsonschema::validator_for(&schema)
            .map_err(|err| anyhow!("invalid {label} schema: {err}"))?;
        Ok(Self { label, validator })
    }

    /// Fail with every violation listed.
    pub fn check(&self, instance: &Value) -> Result<()> {
        let messages: Vec<String> = self
            .validator
            .iter_errors(instance)
            .map(|err| err.to_string())
            .collect();
        if !messages.is_empty() {
            bail!(
                "{} schema validation failed:\n- {}",
                self.label,
                messages.join("\n- ")
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embedded_schemas_compile() {
        DocumentSchema::manifest().expect("manifest schema");
        DocumentSchema::run().expect("run schema");
    }

    #[test]
    fn run_schema_rejects_missing_outcome() {
        let schema = DocumentSchema::run().expect("run schema");
        let err = schema
            .check(&json!({
                "run_id": "r1",
                "task_id": "t1",
                "condition_id": "control",
                "compile_passed": true,
                "tests_passed": true,
                "duration_seconds": 1.0
            }))
            .expect_err("missing succeeded");
        assert!(err.to_string().contains("run schema validation failed"));
        assert!(err.to_string().contains("succeeded"));
    }

    #[test]
    fn run_schema_accepts_non_positive_replicate() {
        let schema = DocumentSchema::run().expect("run schema");
        schema
            .check(&json!({
                "run_id": "r1",
                "task_id": "t1",
                "condition_id": "control",
                "replicate": 0,
                "succeeded": false,
                "compile_passed": false,
                "tests_passed": false,
                "duration_seconds": 0
            }))
            .expect("replicate range is a validation concern");
    }
}
