//! Structured Output Extractor: pulls a JSON object out of an LLM
//! completion that may be wrapped in prose, markdown fences, or a
//! `<think>` block, trying progressively more forgiving strategies.
//!
//! The four layers, in order: strip fences/think-blocks then decode
//! directly; locate the first balanced `{...}` substring and decode that;
//! regex-pluck individual top-level string/array fields out of whatever text
//! remains. Each layer only runs if the previous one failed.

use crate::models::SpecTask;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap());

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

static FIELD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)"([A-Za-z0-9_]+)"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap()
});

/// A single `{title, details}` pair, scanned directly out of raw text when
/// the surrounding `tasks` array itself doesn't parse as JSON.
static TASK_PAIR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\{\s*"title"\s*:\s*"((?:[^"\\]|\\.)*)"\s*,\s*"details"\s*:\s*"((?:[^"\\]|\\.)*)"\s*\}"#).unwrap()
});

/// Extracts a JSON value from raw model output. Returns `None` only when
/// every layer fails to find anything resembling structured data.
pub fn extract(raw: &str) -> Option<Value> {
    let cleaned = THINK_BLOCK.replace_all(raw, "").to_string();

    layer_direct_decode(&cleaned)
        .or_else(|| layer_fenced_decode(&cleaned))
        .or_else(|| layer_substring_decode(&cleaned))
        .or_else(|| layer_field_pluck(&cleaned))
}

fn layer_direct_decode(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

fn layer_fenced_decode(text: &str) -> Option<Value> {
    let captures = CODE_FENCE.captures(text)?;
    let body = captures.get(1)?.as_str();
    serde_json::from_str(body.trim()).ok()
}

/// Finds the first `{` and its matching closing `}` by brace depth,
/// respecting string literals and escapes so braces inside JSON string
/// values don't throw off the count.
fn layer_substring_decode(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return serde_json::from_str(&text[start..end]).ok();
                }
            }
            _ => {}
        }
    }
    None
}

/// Last resort: pull out `"key": "value"` pairs with a regex and rebuild a
/// flat JSON object from them. Unescapes `\"`, `\n`, `\\` in values. Any
/// field whose value spans a nested structure is lost at this layer — it
/// only exists to salvage something from output that failed to parse as
/// full JSON at all.
fn layer_field_pluck(text: &str) -> Option<Value> {
    let mut object = serde_json::Map::new();
    for captures in FIELD_PATTERN.captures_iter(text) {
        let key = captures.get(1)?.as_str().to_string();
        let raw_value = captures.get(2)?.as_str();
        object.insert(key, Value::String(unescape(raw_value)));
    }
    if object.is_empty() {
        None
    } else {
        Some(Value::Object(object))
    }
}

/// A generated spec and its accompanying task breakdown, as produced by the
/// spec generator's prompt contract.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecExtraction {
    pub spec: String,
    pub tasks: Vec<SpecTask>,
}

/// Extracts `{spec, tasks}` from a spec-generation completion. `spec` is
/// taken as-is once the top-level object is recovered; `tasks` falls back to
/// a direct regex scan over the raw text when the `tasks` field itself isn't
/// valid JSON (e.g. truncated output), so a broken array doesn't sink an
/// otherwise-usable spec.
pub fn extract_spec_output(raw: &str) -> Option<SpecExtraction> {
    let value = extract(raw)?;
    let spec = value.get("spec")?.as_str()?.to_string();
    let tasks = value
        .get("tasks")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let title = item.get("title")?.as_str()?.to_string();
                    let details = item.get("details")?.as_str()?.to_string();
                    Some(SpecTask { title, details })
                })
                .collect::<Vec<_>>()
        })
        .filter(|tasks| !tasks.is_empty())
        .unwrap_or_else(|| scan_task_pairs(raw));

    Some(SpecExtraction { spec, tasks })
}

fn scan_task_pairs(raw: &str) -> Vec<SpecTask> {
    TASK_PAIR_PATTERN
        .captures_iter(raw)
        .map(|captures| SpecTask {
            title: unescape(&captures[1]),
            details: unescape(&captures[2]),
        })
        .collect()
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_json_decodes_without_help() {
        let value = extract(r#"{"title": "Fix bug"}"#).unwrap();
        assert_eq!(value["title"], "Fix bug");
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let raw = "Here is the plan:\n```json\n{\"title\": \"Fix bug\"}\n```\nLet me know.";
        let value = extract(raw).unwrap();
        assert_eq!(value["title"], "Fix bug");
    }

    #[test]
    fn think_block_is_stripped_before_parsing() {
        let raw = "<think>reasoning about it</think>\n{\"title\": \"Fix bug\"}";
        let value = extract(raw).unwrap();
        assert_eq!(value["title"], "Fix bug");
    }

    #[test]
    fn substring_decode_ignores_leading_and_trailing_prose() {
        let raw = "Sure, here you go: {\"title\": \"Fix bug\", \"nested\": {\"a\": 1}} Hope that helps!";
        let value = extract(raw).unwrap();
        assert_eq!(value["title"], "Fix bug");
        assert_eq!(value["nested"]["a"], 1);
    }

    #[test]
    fn substring_decode_respects_braces_inside_strings() {
        let raw = r#"prefix {"title": "a { b } c"} suffix"#;
        let value = extract(raw).unwrap();
        assert_eq!(value["title"], "a { b } c");
    }

    #[test]
    fn field_pluck_salvages_flat_fields_from_broken_json() {
        let raw = r#"{"title": "Fix bug", "details": "line one\nline two", oops broken here"#;
        let value = extract(raw).unwrap();
        assert_eq!(value["title"], "Fix bug");
        assert_eq!(value["details"], "line one\nline two");
    }

    #[test]
    fn returns_none_when_nothing_resembles_json() {
        assert!(extract("just a friendly sentence with no data").is_none());
    }

    #[test]
    fn spec_output_parses_spec_and_tasks_from_well_formed_json() {
        let raw = r#"{"spec": "# My Spec", "tasks": [{"title": "Do thing", "details": "Do it well"}]}"#;
        let extraction = extract_spec_output(raw).unwrap();
        assert_eq!(extraction.spec, "# My Spec");
        assert_eq!(extraction.tasks.len(), 1);
        assert_eq!(extraction.tasks[0].title, "Do thing");
        assert_eq!(extraction.tasks[0].details, "Do it well");
    }

    #[test]
    fn spec_output_falls_back_to_scanning_task_pairs_when_tasks_array_is_broken() {
        let raw = r#"{"spec": "# My Spec", "tasks": [{"title": "Do thing", "details": "Do it well"}, {"title": "Second""#;
        let extraction = extract_spec_output(raw).unwrap();
        assert_eq!(extraction.spec, "# My Spec");
        assert_eq!(extraction.tasks.len(), 1);
        assert_eq!(extraction.tasks[0].title, "Do thing");
    }

    #[test]
    fn spec_output_returns_none_without_a_spec_field() {
        assert!(extract_spec_output(r#"{"tasks": []}"#).is_none());
    }

    #[test]
    fn spec_output_tolerates_an_empty_tasks_array() {
        let extraction = extract_spec_output(r#"{"spec": "# Spec", "tasks": []}"#).unwrap();
        assert_eq!(extraction.spec, "# Spec");
        assert!(extraction.tasks.is_empty());
    }
}
