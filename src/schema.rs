//! The structured-review JSON schema (spec.md §6, exact), used by the
//! schema-constrained request paths in each gateway (spec.md §4.5 steps 3/4/6)
//! and, as a correctness fallback, by the [`crate::json_extractor`].

use serde_json::{json, Value};

pub fn review_response_json_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "issues": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "type": { "type": "string" },
                        "line_number": { "type": ["integer", "null"] },
                        "file": { "type": ["string", "null"] },
                        "description": { "type": "string" },
                        "suggestion": { "type": ["string", "null"] },
                        "severity": { "type": "string", "enum": ["info", "warning", "error"] },
                        "target_code": { "type": ["string", "null"] },
                        "suggested_code": { "type": ["string", "null"] }
                    },
                    "required": ["type", "description", "severity"]
                }
            },
            "summary": { "type": "string" },
            "score": { "type": ["number", "null"] },
            "recommendations": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["issues", "summary", "recommendations"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_the_closed_severity_set() {
        let schema = review_response_json_schema();
        let severity_enum =
            &schema["properties"]["issues"]["items"]["properties"]["severity"]["enum"];
        assert_eq!(severity_enum.as_array().unwrap().len(), 3);
    }
}
