//! Bounded JSON summaries.
//!
//! Containers nested up to [`MAX_DEPTH`] levels are expanded; deeper ones are
//! shown as a header with a count of what was left out. Arrays list at most
//! [`MAX_ITEMS`] items.

use serde_json::Value;

/// Deepest container level that is expanded (the root is level 1)
pub const MAX_DEPTH: usize = 3;

/// Maximum items listed per array
pub const MAX_ITEMS: usize = 10;

/// Summarize a JSON document. Invalid JSON produces a parse-error line
/// followed by the raw body.
pub fn summarize(body: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(body.trim()) {
        Ok(value) => summarize_value(&value),
        Err(e) => {
            let mut lines = vec![format!("JSON parse error: {}", e)];
            lines.extend(super::truncate_raw(body));
            lines
        },
    }
}

/// Summarize an already parsed value
pub fn summarize_value(value: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    match value {
        // The root object's keys sit at the left margin, without a header.
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                render(&format!("{}: ", key), child, 2, 0, &mut lines);
            }
        },
        _ => render("", value, 1, 0, &mut lines),
    }
    lines
}

fn render(prefix: &str, value: &Value, level: usize, indent: usize, out: &mut Vec<String>) {
    let pad = "  ".repeat(indent + 1);

    match value {
        Value::Array(items) if items.is_empty() => out.push(format!("{}[]", prefix)),
        Value::Array(items) => {
            out.push(format!("{}[{}]", prefix, count(items.len(), "item", "items")));
            if level > MAX_DEPTH {
                out.push(format!(
                    "{}... {} omitted (nested too deep)",
                    pad,
                    count(items.len(), "item", "items")
                ));
                return;
            }
            for (i, item) in items.iter().take(MAX_ITEMS).enumerate() {
                render(&format!("{}{}. ", pad, i + 1), item, level + 1, indent + 1, out);
            }
            if items.len() > MAX_ITEMS {
                let hidden = items.len() - MAX_ITEMS;
                let noun = if hidden == 1 { "item" } else { "items" };
                out.push(format!("{}... and {} more {}", pad, hidden, noun));
            }
        },
        Value::Object(map) if map.is_empty() => out.push(format!("{}{{}}", prefix)),
        Value::Object(map) => {
            out.push(format!("{}{{{}}}", prefix, count(map.len(), "key", "keys")));
            if level > MAX_DEPTH {
                out.push(format!(
                    "{}... {} omitted (nested too deep)",
                    pad,
                    count(map.len(), "key", "keys")
                ));
                return;
            }
            for (key, child) in map {
                render(&format!("{}{}: ", pad, key), child, level + 1, indent + 1, out);
            }
        },
        scalar => out.push(format!("{}{}", prefix, render_scalar(scalar))),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn count(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("1 {}", singular)
    } else {
        format!("{} {}", n, plural)
    }
}
