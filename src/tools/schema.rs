//! Tool schema validation
//!
//! Checks JSON values against the subset of JSON Schema that tool
//! definitions use: `type`, `properties`, `required`,
//! `additionalProperties: false`, `items` and `enum`. An empty schema accepts
//! anything.

use serde_json::Value;

/// Validate `value` against `schema`, returning the first violation.
///
/// Violations name the offending location, `$` being the root.
pub fn validate(schema: &Value, value: &Value) -> std::result::Result<(), String> {
    validate_at(schema, value, "$")
}

fn validate_at(schema: &Value, value: &Value, path: &str) -> std::result::Result<(), String> {
    let Some(schema) = schema.as_object() else {
        // `true` and non-object schemas accept everything; `false` rejects.
        return match schema {
            Value::Bool(false) => Err(format!("{path}: no value is allowed here")),
            _ => Ok(()),
        };
    };

    if let Some(expected) = schema.get("type") {
        let allowed: Vec<&str> = match expected {
            Value::String(t) => vec![t.as_str()],
            Value::Array(types) => types.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|t| matches_type(t, value)) {
            return Err(format!(
                "{path}: expected {}, found {}",
                allowed.join(" or "),
                type_name(value)
            ));
        }
    }

    if let Some(Value::Array(options)) = schema.get("enum") {
        if !options.contains(value) {
            return Err(format!("{path}: {value} is not one of the allowed values"));
        }
    }

    if let Value::Object(map) = value {
        if let Some(Value::Array(required)) = schema.get("required") {
            for key in required.iter().filter_map(Value::as_str) {
                if !map.contains_key(key) {
                    return Err(format!("{path}: missing required property '{key}'"));
                }
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);
        if let Some(properties) = properties {
            for (key, sub_schema) in properties {
                if let Some(sub_value) = map.get(key) {
                    validate_at(sub_schema, sub_value, &format!("{path}.{key}"))?;
                }
            }
        }

        if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
            for key in map.keys() {
                let declared = properties.is_some_and(|p| p.contains_key(key));
                if !declared {
                    return Err(format!("{path}: unexpected property '{key}'"));
                }
            }
        }
    }

    if let (Value::Array(items), Some(item_schema)) = (value, schema.get("items")) {
        for (i, item) in items.iter().enumerate() {
            validate_at(item_schema, item, &format!("{path}[{i}]"))?;
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.as_f64().is_some_and(|f| f.fract() == 0.0),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn city_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": {"type": "string"},
                "days": {"type": "integer"}
            },
            "required": ["city"],
            "additionalProperties": false
        })
    }

    #[test]
    fn test_valid_object() {
        assert!(validate(&city_schema(), &json!({"city": "Berlin", "days": 3})).is_ok());
    }

    #[test]
    fn test_missing_required() {
        let err = validate(&city_schema(), &json!({"days": 3})).unwrap_err();
        assert!(err.contains("missing required property 'city'"));
    }

    #[test]
    fn test_nested_type_error_has_path() {
        let err = validate(&city_schema(), &json!({"city": "Berlin", "days": 1.5})).unwrap_err();
        assert_eq!(err, "$.days: expected integer, found number");
    }

    #[test]
    fn test_additional_properties_rejected() {
        let err = validate(&city_schema(), &json!({"city": "Oslo", "unit": "C"})).unwrap_err();
        assert!(err.contains("unexpected property 'unit'"));
    }

    #[test]
    fn test_empty_schema_accepts_anything() {
        assert!(validate(&json!({}), &json!([1, "two", null])).is_ok());
        assert!(validate(&json!(true), &json!("x")).is_ok());
        assert!(validate(&json!(false), &json!("x")).is_err());
    }

    #[test]
    fn test_items_and_enum() {
        let schema = json!({"type": "array", "items": {"enum": ["a", "b"]}});
        assert!(validate(&schema, &json!(["a", "b", "a"])).is_ok());
        let err = validate(&schema, &json!(["a", "c"])).unwrap_err();
        assert!(err.starts_with("$[1]"));
    }

    #[test]
    fn test_type_union() {
        let schema = json!({"type": ["string", "null"]});
        assert!(validate(&schema, &json!(null)).is_ok());
        assert!(validate(&schema, &json!(3)).is_err());
    }

    #[test]
    fn test_integral_float_is_integer() {
        let schema = json!({"type": "integer"});
        assert!(validate(&schema, &json!(1.0)).is_ok());
        assert!(validate(&schema, &json!(7)).is_ok());
        assert!(validate(&schema, &json!(1.5)).is_err());
        assert!(validate(&schema, &json!("1")).is_err());
    }
}
