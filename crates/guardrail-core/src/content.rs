//! Content values under validation.
//!
//! Content is either raw text or a structured key-value map. Structured
//! content has a canonical text form (JSON with recursively sorted keys) that
//! is used for length bounds and for hashing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Content produced by an upstream generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Structured(Map<String, Value>),
}

impl Content {
    /// Create text content.
    pub fn text(content: impl Into<String>) -> Self {
        Content::Text(content.into())
    }

    /// Create structured content from a JSON map.
    pub fn structured(map: Map<String, Value>) -> Self {
        Content::Structured(map)
    }

    /// Convert an arbitrary JSON value: objects become structured content,
    /// strings become text, anything else is kept as its JSON text.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Content::Structured(map),
            Value::String(text) => Content::Text(text),
            other => Content::Text(other.to_string()),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Content::Structured(_))
    }

    /// Canonical text used for length checks and hashing.
    pub fn canonical_text(&self) -> Cow<'_, str> {
        match self {
            Content::Text(text) => Cow::Borrowed(text),
            Content::Structured(map) => Cow::Owned(Value::Object(canonical_map(map)).to_string()),
        }
    }

    /// Length of the canonical text in characters.
    pub fn char_len(&self) -> usize {
        self.canonical_text().chars().count()
    }

    /// View the content as a JSON object, parsing text if necessary.
    pub fn as_object(&self) -> Option<Cow<'_, Map<String, Value>>> {
        match self {
            Content::Structured(map) => Some(Cow::Borrowed(map)),
            Content::Text(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Some(Cow::Owned(map)),
                _ => None,
            },
        }
    }

    /// All string values with their dotted path, in sorted key order.
    ///
    /// Text content yields a single leaf with no path.
    pub fn string_leaves(&self) -> Vec<(Option<String>, &str)> {
        match self {
            Content::Text(text) => vec![(None, text.as_str())],
            Content::Structured(map) => {
                let mut leaves = Vec::new();
                for key in sorted_keys(map) {
                    collect_leaves(&map[key], key.clone(), &mut leaves);
                }
                leaves
            }
        }
    }

    /// Rewrite every string leaf in place.
    pub(crate) fn rewrite_strings<F>(&mut self, mut rewrite: F)
    where
        F: FnMut(Option<&str>, &mut String),
    {
        match self {
            Content::Text(text) => rewrite(None, text),
            Content::Structured(map) => {
                for (key, value) in map.iter_mut() {
                    rewrite_leaves(value, key, &mut rewrite);
                }
            }
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::text(text)
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

/// Look up a dotted path (`a.b.0.c`) inside a JSON object.
pub fn lookup<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = map.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(inner) => inner.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn sorted_keys(map: &Map<String, Value>) -> Vec<&String> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys
}

fn canonical_map(map: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for key in sorted_keys(map) {
        out.insert(key.clone(), canonical_value(&map[key]));
    }
    out
}

fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(canonical_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        other => other.clone(),
    }
}

fn collect_leaves<'a>(value: &'a Value, path: String, out: &mut Vec<(Option<String>, &'a str)>) {
    match value {
        Value::String(text) => out.push((Some(path), text.as_str())),
        Value::Object(map) => {
            for key in sorted_keys(map) {
                collect_leaves(&map[key], format!("{}.{}", path, key), out);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_leaves(item, format!("{}.{}", path, index), out);
            }
        }
        _ => {}
    }
}

fn rewrite_leaves<F>(value: &mut Value, path: &str, rewrite: &mut F)
where
    F: FnMut(Option<&str>, &mut String),
{
    match value {
        Value::String(text) => rewrite(Some(path), text),
        Value::Object(map) => {
            for (key, inner) in map.iter_mut() {
                rewrite_leaves(inner, &format!("{}.{}", path, key), rewrite);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                rewrite_leaves(item, &format!("{}.{}", path, index), rewrite);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn structured(value: Value) -> Content {
        Content::from_value(value)
    }

    #[test]
    fn test_canonical_text_sorts_keys() {
        let a = structured(json!({"b": 1, "a": {"d": 2, "c": 3}}));
        let b = structured(json!({"a": {"c": 3, "d": 2}, "b": 1}));
        assert_eq!(a.canonical_text(), b.canonical_text());
        assert_eq!(a.canonical_text(), r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn test_text_parses_as_object() {
        let content = Content::text(r#"{"decision": "APPROVED"}"#);
        let map = content.as_object().unwrap();
        assert_eq!(map["decision"], "APPROVED");

        assert!(Content::text("plain words").as_object().is_none());
        assert!(Content::text("[1, 2]").as_object().is_none());
    }

    #[test]
    fn test_string_leaves_have_paths() {
        let content = structured(json!({
            "summary": "ok",
            "applicant": {"notes": ["first", "second"], "age": 40}
        }));
        let leaves = content.string_leaves();
        assert_eq!(
            leaves,
            vec![
                (Some("applicant.notes.0".to_string()), "first"),
                (Some("applicant.notes.1".to_string()), "second"),
                (Some("summary".to_string()), "ok"),
            ]
        );
    }

    #[test]
    fn test_rewrite_strings_by_path() {
        let mut content = structured(json!({"a": {"b": "secret"}, "c": "keep"}));
        content.rewrite_strings(|path, text| {
            if path == Some("a.b") {
                *text = "[gone]".to_string();
            }
        });
        assert_eq!(content, structured(json!({"a": {"b": "[gone]"}, "c": "keep"})));
    }

    #[test]
    fn test_lookup_dotted_path() {
        let value = json!({"a": {"b": [{"c": null}, {"c": 5}]}});
        let map = value.as_object().unwrap();
        assert_eq!(lookup(map, "a.b.1.c"), Some(&json!(5)));
        assert_eq!(lookup(map, "a.b.0.c"), Some(&Value::Null));
        assert_eq!(lookup(map, "a.x"), None);
        assert_eq!(lookup(map, "a.b.nope"), None);
    }
}
