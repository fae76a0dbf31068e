use serde_json::Value;

/// Outcome of checking one serialized feature value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueCheck {
    Ok,
    /// Malformed JSON: always a hard error, even in warn mode.
    InvalidJson(String),
    /// Parsed fine but does not conform to the feature's schema. Hard or
    /// soft depending on the experiment's `warn_feature_schema` flag.
    SchemaMismatch(Vec<String>),
}

pub struct SchemaCheck;

impl SchemaCheck {
    /// Parse a serialized feature value.
    pub fn parse_value(value: &str) -> Result<Value, String> {
        serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {e}"))
    }

    /// Validate a parsed value against a bundled schema document. The
    /// compiled validator indexes the document's own `$id`/`$defs`
    /// subresources, so local references resolve without any network fetch.
    pub fn validate_against_schema(schema: &Value, value: &Value) -> Vec<String> {
        let validator = match jsonschema::validator_for(schema) {
            Ok(validator) => validator,
            Err(e) => return vec![format!("Invalid schema: {e}")],
        };
        validator.iter_errors(value).map(|e| e.to_string()).collect()
    }

    /// Full check of one serialized value against an optional schema
    /// source. An absent schema skips conformance checking but still
    /// requires syntactically valid JSON.
    pub fn check_value(schema_src: Option<&str>, value: &str) -> ValueCheck {
        let parsed = match Self::parse_value(value) {
            Ok(parsed) => parsed,
            Err(message) => return ValueCheck::InvalidJson(message),
        };

        let Some(schema_src) = schema_src else {
            return ValueCheck::Ok;
        };

        let schema: Value = match serde_json::from_str(schema_src) {
            Ok(schema) => schema,
            Err(e) => return ValueCheck::SchemaMismatch(vec![format!("Invalid schema: {e}")]),
        };

        let messages = Self::validate_against_schema(&schema, &parsed);
        if messages.is_empty() {
            ValueCheck::Ok
        } else {
            ValueCheck::SchemaMismatch(messages)
        }
    }
}
