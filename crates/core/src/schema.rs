//! Checks a mapping against the subset of JSON Schema that agents publish in
//! their registry metadata: top-level `required` keys and `properties.*.type`.

use serde_json::Value;

use crate::types::Context;

/// Returns every problem found, in schema order: missing required keys first,
/// then type mismatches in data order.
pub fn validate_against_schema(data: &Context, schema: &Value) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !data.contains_key(field) {
                errors.push(format!("Missing required field: {field}"));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (field, value) in data {
            let Some(expected) = properties
                .get(field)
                .and_then(|property| property.get("type"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            if !matches_type(value, expected) {
                errors.push(format!(
                    "Field '{field}': expected {expected}, got {}",
                    json_type(value)
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::validate_against_schema;
    use crate::types::Context;

    fn data(value: serde_json::Value) -> Context {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn reports_missing_required_fields_and_type_mismatches() {
        let schema = json!({
            "type": "object",
            "required": ["question", "context"],
            "properties": {
                "question": {"type": "string"},
                "retries": {"type": "integer"},
                "context": {"type": "object"},
            },
        });

        let errors = validate_against_schema(&data(json!({"question": 7, "retries": 1.5})), &schema)
            .expect_err("invalid data");
        assert_eq!(
            errors,
            vec![
                "Missing required field: context".to_owned(),
                "Field 'question': expected string, got integer".to_owned(),
                "Field 'retries': expected integer, got number".to_owned(),
            ]
        );
    }

    #[test]
    fn undeclared_keys_and_untyped_properties_pass() {
        let schema = json!({"required": ["answer"], "properties": {"answer": {}}});
        let valid = data(json!({"answer": {"nested": true}, "extra": [1, 2]}));
        assert_eq!(validate_against_schema(&valid, &schema), Ok(()));
        assert_eq!(validate_against_schema(&valid, &json!({})), Ok(()));
    }
}
