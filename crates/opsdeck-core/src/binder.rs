// Parameter binding
//
// Substitutes `{{key}}` tokens inside string leaves of a JSON tree.
// Keys missing from the parameter set stay as literal `{{key}}` text so
// unresolved placeholders surface in the output instead of failing the run.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Runtime parameters for a run. Iteration is in key order, which makes
/// substitution deterministic per key.
pub type Params = BTreeMap<String, String>;

/// Render a JSON value as a parameter string.
///
/// Strings are taken verbatim; every other value uses its JSON text
/// (`42` -> `"42"`, `true` -> `"true"`, `null` -> `"null"`).
pub fn stringify_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build a parameter set from loosely typed JSON input.
pub fn params_from_json(values: &Map<String, Value>) -> Params {
    values
        .iter()
        .map(|(key, value)| (key.clone(), stringify_param(value)))
        .collect()
}

/// Replace every `{{key}}` occurrence for every key in `params`.
pub fn bind_str(input: &str, params: &Params) -> String {
    if !input.contains("{{") {
        return input.to_string();
    }
    let mut result = input.to_string();
    for (key, value) in params {
        let token = format!("{{{{{key}}}}}");
        if result.contains(&token) {
            result = result.replace(&token, value);
        }
    }
    result
}

/// Bind params into a JSON tree.
///
/// Strings are substituted, mappings and sequences are rebuilt with bound
/// children in the same order, every other leaf passes through unchanged.
pub fn bind(node: &Value, params: &Params) -> Value {
    match node {
        Value::String(s) => Value::String(bind_str(s, params)),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), bind(value, params)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| bind(v, params)).collect()),
        other => other.clone(),
    }
}

/// Collect placeholder names still present in a tree (sorted, deduplicated).
pub fn unresolved_placeholders(node: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_placeholders(node, &mut found);
    found.sort();
    found.dedup();
    found
}

fn collect_placeholders(node: &Value, found: &mut Vec<String>) {
    match node {
        Value::String(s) => {
            let mut rest = s.as_str();
            while let Some(start) = rest.find("{{") {
                let after = &rest[start + 2..];
                match after.find("}}") {
                    Some(end) => {
                        let name = &after[..end];
                        if !name.is_empty() && !name.contains('{') {
                            found.push(name.to_string());
                        }
                        rest = &after[end + 2..];
                    }
                    None => break,
                }
            }
        }
        Value::Object(map) => map.values().for_each(|v| collect_placeholders(v, found)),
        Value::Array(items) => items.iter().for_each(|v| collect_placeholders(v, found)),
        _ => {}
    }
}
