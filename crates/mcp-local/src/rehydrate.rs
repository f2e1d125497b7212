use serde_json::Value;

/// Recursively parse over-serialized JSON carried as string fields
/// (spec.md §4.4 step 2 "Parameter rehydration").
///
/// For every string whose trimmed value looks like a JSON object or array
/// (`{...}` / `[...]`), attempt to parse it; on success, substitute the
/// parsed value and recurse into it. Values that don't parse, or parse to
/// something other than an object/array, are left untouched.
#[must_use]
pub fn rehydrate(value: Value) -> Value {
    match value {
        Value::String(s) => rehydrate_string(s),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, rehydrate(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(rehydrate).collect()),
        other => other,
    }
}

fn rehydrate_string(s: String) -> Value {
    let trimmed = s.trim();
    let looks_like_json = (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));
    if !looks_like_json {
        return Value::String(s);
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(parsed @ (Value::Object(_) | Value::Array(_))) => rehydrate(parsed),
        _ => Value::String(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nested_object_string() {
        let input = json!({"filter": "{\"property\":\"Status\"}"});
        let out = rehydrate(input);
        assert_eq!(out["filter"]["property"], "Status");
    }

    #[test]
    fn parses_nested_array_string() {
        let input = json!({"ids": "[1,2,3]"});
        let out = rehydrate(input);
        assert_eq!(out["ids"], json!([1, 2, 3]));
    }

    #[test]
    fn recurses_into_parsed_values() {
        let input = json!({"outer": "{\"inner\":\"[1,2]\"}"});
        let out = rehydrate(input);
        assert_eq!(out["outer"]["inner"], json!([1, 2]));
    }

    #[test]
    fn leaves_plain_strings_untouched() {
        let input = json!({"name": "hello world"});
        assert_eq!(rehydrate(input.clone()), input);
    }

    #[test]
    fn leaves_unparseable_brace_strings_untouched() {
        let input = json!({"name": "{not json}"});
        assert_eq!(rehydrate(input.clone()), input);
    }
}
