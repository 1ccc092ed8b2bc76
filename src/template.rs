//! Minimal mustache-style renderer for PR and issue bodies.
//!
//! Supports `{{ dotted.path }}` lookups into a JSON context. Missing values
//! render as an empty string; non-string values render as compact JSON.

use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;

use crate::github::Repository;

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").unwrap());

fn lookup<'a>(ctx: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(ctx, |value, key| value.get(key))
}

/// Render `template` against `ctx`.
pub fn render(template: &str, ctx: &Value) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &regex::Captures<'_>| {
            match lookup(ctx, &caps[1]) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            }
        })
        .into_owned()
}

/// Standard context: `repo.*`, `inputs.*`, `playbook.name`, `branch`.
pub fn context(
    repo: &Repository,
    inputs: &serde_json::Map<String, Value>,
    playbook_name: &str,
    branch: &str,
) -> Value {
    json!({
        "repo": repo,
        "inputs": inputs,
        "playbook": { "name": playbook_name },
        "branch": branch,
    })
}
