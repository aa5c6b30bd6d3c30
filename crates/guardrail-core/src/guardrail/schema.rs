//! JSON Schema validation for guardrail definitions.
//!
//! Definitions are validated against schema/guardrail.schema.json before
//! they are deserialized, so shape errors are reported all at once with
//! their location instead of stopping at the first serde error.

use std::sync::OnceLock;

/// Embedded definition schema (loaded at compile time).
const GUARDRAIL_SCHEMA_JSON: &str = include_str!("../../schema/guardrail.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(GUARDRAIL_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        match jsonschema::options().build(&schema_value) {
            Ok(v) => Ok(v),
            Err(e) => Err(format!("Failed to compile schema: {}", e)),
        }
    });

    result.as_ref().map_err(|e| e.clone())
}

/// Validate a definition JSON value against the schema.
///
/// Returns every violation as "<message> at <instance path>".
pub fn validate_definition_schema(definition: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(definition)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
