//! Structured output schema for the external classifier
//!
//! The model must return exactly this shape. The schema travels with the
//! request (the local server constrains decoding to it), and the raw reply
//! is validated against the same schema before anything is trusted, so a
//! misbehaving model degrades to the fallback instead of poisoning a
//! decision.

use crate::decision::{ComplexityTier, IntentLabel};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Structured output the classifier model must produce
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClassifierOutput {
    /// Intent label, one of the allowed set listed in the prompt
    pub intent: String,

    /// Expected reasoning depth for the request
    pub complexity: ComplexityTier,

    /// Model confidence in the label, 0.0 to 1.0
    pub confidence: f32,

    /// One-line justification (observability only, never shown to users)
    pub reasoning: String,
}

impl ClassifierOutput {
    /// Validate semantic constraints the schema cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.intent.trim().is_empty() {
            return Err("intent must not be empty".to_string());
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence must be within [0.0, 1.0], got {}",
                self.confidence
            ));
        }
        Ok(())
    }

    /// Generate the JSON schema for this structure
    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(ClassifierOutput);
        serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({}))
    }

    /// Schema with the intent field constrained to the allowed labels
    ///
    /// The label set is open (learned labels join it), so the enum is
    /// injected per request rather than baked into the type.
    pub fn json_schema_with_intents(intents: &[IntentLabel]) -> serde_json::Value {
        let mut schema = Self::json_schema();
        let labels: Vec<serde_json::Value> = intents
            .iter()
            .map(|intent| serde_json::Value::String(intent.as_str().to_string()))
            .collect();
        if let Some(intent_property) = schema
            .pointer_mut("/properties/intent")
            .and_then(|v| v.as_object_mut())
        {
            intent_property.insert("enum".to_string(), serde_json::Value::Array(labels));
        }
        schema
    }
}

/// Validate a raw model reply against a schema before deserializing it
pub fn validate_against_schema(
    instance: &serde_json::Value,
    schema: &serde_json::Value,
) -> Result<(), String> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| format!("Schema compilation error: {e}"))?;

    let error_messages: Vec<String> = validator
        .iter_errors(instance)
        .map(|e| format!("At '{}': {}", e.instance_path, e))
        .collect();

    if error_messages.is_empty() {
        Ok(())
    } else {
        Err(error_messages.join("; "))
    }
}
