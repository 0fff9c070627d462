use serde_json::{json, Map, Value};

use crate::error::TicktickError;

/// Parse `key:value` / `key=value` CLI arguments into a JSON object.
///
/// The key ends at the first `:` or `=`, so values may contain either
/// (`due_date=2026-03-01T09:00:00+0000`). Values are coerced by
/// [`coerce_value`].
pub fn parse_args(tool: &str, args: &[String]) -> Result<Value, TicktickError> {
    let mut map = Map::new();
    for arg in args {
        let Some(pos) = arg.find([':', '=']) else {
            return Err(TicktickError::InvalidArguments {
                tool: tool.to_string(),
                detail: format!("cannot parse '{arg}': expected 'key:value' or 'key=value'"),
            });
        };
        let key = arg[..pos].trim();
        if key.is_empty() {
            return Err(TicktickError::InvalidArguments {
                tool: tool.to_string(),
                detail: format!("empty key in '{arg}'"),
            });
        }
        map.insert(key.to_string(), coerce_value(&arg[pos + 1..]));
    }
    Ok(Value::Object(map))
}

/// Quoted text stays a string; `true`/`false`, `null`, numbers and JSON
/// objects/arrays are parsed; anything else is a string.
pub fn coerce_value(raw: &str) -> Value {
    if raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')))
    {
        return Value::String(raw[1..raw.len() - 1].to_string());
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if raw == "null" {
        return Value::Null;
    }
    if let Ok(n) = raw.parse::<i64>() {
        return json!(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return json!(f);
    }
    if (raw.starts_with('{') && raw.ends_with('}')) || (raw.starts_with('[') && raw.ends_with(']'))
    {
        if let Ok(v) = serde_json::from_str::<Value>(raw) {
            return v;
        }
    }
    Value::String(raw.to_string())
}

/// Turn coerced scalars back into strings where the tool's input schema
/// declares a string property, so numeric-looking ids survive the CLI.
pub fn conform_to_schema(args: &mut Value, schema: &Value) {
    let (Some(args), Some(properties)) = (
        args.as_object_mut(),
        schema.get("properties").and_then(Value::as_object),
    ) else {
        return;
    };
    for (key, value) in args.iter_mut() {
        let wants_string = properties
            .get(key)
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
            == Some("string");
        if !wants_string {
            continue;
        }
        match value {
            Value::Number(n) => *value = Value::String(n.to_string()),
            Value::Bool(b) => *value = Value::String(b.to_string()),
            _ => {}
        }
    }
}

/// Closest known tool name (Levenshtein distance <= 2). `None` when nothing
/// is close or two names tie.
pub fn suggest_tool(input: &str, known_tools: &[&str]) -> Option<String> {
    let mut best_dist = usize::MAX;
    let mut best_tool: Option<&str> = None;
    let mut ambiguous = false;

    for &tool in known_tools {
        let dist = strsim::levenshtein(input, tool);
        if dist < best_dist {
            best_dist = dist;
            best_tool = Some(tool);
            ambiguous = false;
        } else if dist == best_dist {
            ambiguous = true;
        }
    }

    if best_dist <= 2 && !ambiguous {
        best_tool.map(|t| t.to_string())
    } else {
        None
    }
}
