use anyhow::{anyhow, Result};
use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use schemars::schema_for;
use serde_json::Value as JsonValue;

/// Schema generated from [`crate::types::SwarmState`], so it cannot drift from
/// the structs that write `state.json`.
static STATE_SCHEMA_GENERATED: Lazy<JsonValue> = Lazy::new(|| {
    let schema = schema_for!(crate::types::SwarmState);
    serde_json::to_value(&schema).expect("schemars schema must serialize to JSON")
});

static STATE_SCHEMA: Lazy<JSONSchema> = Lazy::new(|| {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&STATE_SCHEMA_GENERATED)
        .expect("failed to compile generated swarm state JSON schema")
});

/// Validate a parsed `state.json` value before it is deserialized.
pub fn validate_state_value(value: &JsonValue) -> Result<()> {
    let result: Result<()> = match STATE_SCHEMA.validate(value) {
        Ok(()) => Ok(()),
        Err(err_iter) => {
            let mut msgs: Vec<String> = Vec::new();
            for (i, e) in err_iter.enumerate() {
                if i >= 10 {
                    msgs.push("... (more schema errors omitted)".to_string());
                    break;
                }
                let instance_path = e.instance_path.to_string();
                let path = if instance_path.is_empty() {
                    "/".to_string()
                } else {
                    instance_path
                };
                msgs.push(format!("at {path}: {e}"));
            }
            Err(anyhow!(
                "swarm state schema validation failed:\n{}",
                msgs.join("\n")
            ))
        }
    };
    result
}

/// The generated state schema, as printed by `swarm schema`.
pub fn state_schema_json() -> &'static JsonValue {
    &STATE_SCHEMA_GENERATED
}
