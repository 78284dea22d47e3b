//! The structured data that flows between pipeline stages.
//!
//! Results are a closed tagged variant (`serde_json::Value`: Null, Bool,
//! Number, String, Array, Object) with insertion-ordered mappings. Resolver
//! and formatter logic pattern-match over these variants.

use serde_json::{Map, Value};

use crate::error::EngineError;

/// One step of a dotted/indexed path: `.name` or `[index]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// A parsed reference such as `pets[0].name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuePath {
    pub root: String,
    pub segments: Vec<PathSegment>,
}

impl ValuePath {
    /// Parse `root(.field|[index])*`. Whitespace around the path is ignored.
    pub fn parse(text: &str) -> Result<Self, EngineError> {
        let text = text.trim();
        let bad = |reason: &str| EngineError::invalid_path(text, reason);

        let root_len = text
            .find(|c: char| c == '.' || c == '[')
            .unwrap_or(text.len());
        let root = &text[..root_len];
        if !is_identifier(root) {
            return Err(bad("expected a variable name"));
        }

        let mut segments = Vec::new();
        let mut rest = &text[root_len..];
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('.') {
                let end = after
                    .find(|c: char| c == '.' || c == '[')
                    .unwrap_or(after.len());
                let field = &after[..end];
                if field.is_empty() {
                    return Err(bad("empty field name after '.'"));
                }
                segments.push(PathSegment::Field(field.to_string()));
                rest = &after[end..];
            } else if let Some(after) = rest.strip_prefix('[') {
                let Some(close) = after.find(']') else {
                    return Err(bad("unclosed '['"));
                };
                let index = after[..close]
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| bad("index must be a non-negative integer"))?;
                segments.push(PathSegment::Index(index));
                rest = &after[close + 1..];
            } else {
                return Err(bad("expected '.' or '['"));
            }
        }

        Ok(Self {
            root: root.to_string(),
            segments,
        })
    }

    /// Walk `segments` starting from `value`.
    pub fn lookup<'v>(&self, value: &'v Value) -> Result<&'v Value, EngineError> {
        let mut current = value;
        let mut walked = self.root.clone();
        for seg in &self.segments {
            current = match (seg, current) {
                (PathSegment::Field(name), Value::Object(map)) => match map.get(name) {
                    Some(v) => v,
                    None => {
                        return Err(EngineError::invalid_path(
                            self.to_string(),
                            format!("'{walked}' has no field '{name}'"),
                        ));
                    }
                },
                (PathSegment::Index(i), Value::Array(items)) => match items.get(*i) {
                    Some(v) => v,
                    None => {
                        return Err(EngineError::invalid_path(
                            self.to_string(),
                            format!("index {i} out of bounds for '{walked}' (length {})", items.len()),
                        ));
                    }
                },
                (seg, other) => {
                    let what = match seg {
                        PathSegment::Field(_) => "access a field of",
                        PathSegment::Index(_) => "index into",
                    };
                    return Err(EngineError::invalid_path(
                        self.to_string(),
                        format!("cannot {what} {} '{walked}'", type_name(other)),
                    ));
                }
            };
            match seg {
                PathSegment::Field(name) => {
                    walked.push('.');
                    walked.push_str(name);
                }
                PathSegment::Index(i) => walked.push_str(&format!("[{i}]")),
            }
        }
        Ok(current)
    }
}

impl std::fmt::Display for ValuePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root)?;
        for seg in &self.segments {
            match seg {
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Human-facing type name used by `inspect` and `var list`.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Stringify for template substitution and table cells: text is used
/// verbatim, everything else is compact JSON.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Short single-line preview, truncated to `max` characters.
pub fn preview(value: &Value, max: usize) -> String {
    let text = value.to_string();
    if text.chars().count() <= max {
        return text;
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Structured summary of a value for `inspect`.
pub fn summarize(name: &str, value: &Value) -> Value {
    let mut summary = Map::new();
    summary.insert("name".into(), Value::from(name));
    summary.insert("type".into(), Value::from(type_name(value)));
    match value {
        Value::Array(items) => {
            summary.insert("length".into(), Value::from(items.len()));
            match items.first() {
                Some(Value::Object(first)) => {
                    let keys: Vec<Value> = first.keys().map(|k| Value::from(k.as_str())).collect();
                    summary.insert("item_zero_keys".into(), Value::Array(keys));
                }
                Some(first) => {
                    summary.insert("item_zero_preview".into(), Value::from(preview(first, 80)));
                }
                None => {}
            }
        }
        Value::Object(map) => {
            summary.insert("length".into(), Value::from(map.len()));
            let keys: Vec<Value> = map.keys().map(|k| Value::from(k.as_str())).collect();
            summary.insert("keys".into(), Value::Array(keys));
        }
        scalar => {
            summary.insert("preview".into(), Value::from(preview(scalar, 80)));
        }
    }
    Value::Object(summary)
}
