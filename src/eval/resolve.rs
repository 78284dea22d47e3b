//! `{{ path }}` template resolution against session variables.

use serde_json::Value;

use crate::error::EngineError;
use crate::session::Session;
use crate::value::{ValuePath, to_text};

/// Resolve every template in `value`, recursing into sequences and mappings.
pub fn resolve(value: &Value, session: &Session) -> Result<Value, EngineError> {
    match value {
        Value::String(text) => resolve_text(text, session),
        Value::Array(items) => items
            .iter()
            .map(|v| resolve(v, session))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), resolve(v, session)?)))
            .collect::<Result<serde_json::Map<_, _>, EngineError>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}

/// A `{{ ... }}` occurrence: byte range in the text and the inner expression.
#[derive(Debug, PartialEq)]
struct TemplateSpan<'t> {
    start: usize,
    end: usize,
    expr: &'t str,
}

/// Spans in order. An unterminated `{{` and everything after it is literal.
fn spans(text: &str) -> Vec<TemplateSpan<'_>> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(open) = text[from..].find("{{").map(|i| i + from) {
        let Some(close) = text[open + 2..].find("}}").map(|i| i + open + 2) else {
            break;
        };
        out.push(TemplateSpan {
            start: open,
            end: close + 2,
            expr: &text[open + 2..close],
        });
        from = close + 2;
    }
    out
}

fn lookup(expr: &str, session: &Session) -> Result<Value, EngineError> {
    let path = ValuePath::parse(expr)?;
    let root = session.get_variable(&path.root)?;
    path.lookup(root).cloned()
}

/// A string that is exactly one span (ignoring surrounding whitespace)
/// resolves to the native value; mixed text always resolves to a string.
fn resolve_text(text: &str, session: &Session) -> Result<Value, EngineError> {
    let found = spans(text);
    if found.is_empty() {
        return Ok(Value::String(text.to_string()));
    }

    let lead = text.len() - text.trim_start().len();
    let trail = text.trim_end().len();
    if let [only] = found.as_slice()
        && only.start == lead
        && only.end == trail
    {
        return lookup(only.expr, session);
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for span in &found {
        out.push_str(&text[last..span.start]);
        out.push_str(&to_text(&lookup(span.expr, session)?));
        last = span.end;
    }
    out.push_str(&text[last..]);
    Ok(Value::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> Session {
        let mut s = Session::new();
        s.set_variable("pets", json!([{"name": "rex", "age": 3}]), "test");
        s.set_variable("n", json!(7), "test");
        s
    }

    #[test]
    fn whole_span_keeps_native_type() {
        let s = session();
        assert_eq!(
            resolve(&json!("{{ pets }}"), &s).unwrap(),
            json!([{"name": "rex", "age": 3}])
        );
        assert_eq!(resolve(&json!("{{pets[0].age}}"), &s).unwrap(), json!(3));
    }

    #[test]
    fn mixed_text_is_stringified() {
        let s = session();
        assert_eq!(
            resolve(&json!("first: {{ pets[0].name }} of {{ n }}"), &s).unwrap(),
            json!("first: rex of 7")
        );
        assert_eq!(
            resolve(&json!("prefix {{ pets }}"), &s).unwrap(),
            json!("prefix [{\"name\":\"rex\",\"age\":3}]")
        );
    }

    #[test]
    fn literal_without_span_is_unchanged() {
        let s = session();
        for text in ["plain", "", "{ not a template }", "a {{ b"] {
            assert_eq!(resolve(&json!(text), &s).unwrap(), json!(text));
        }
    }

    #[test]
    fn nested_structures_are_resolved() {
        let s = session();
        assert_eq!(
            resolve(&json!({"k": ["{{ n }}", 1]}), &s).unwrap(),
            json!({"k": [7, 1]})
        );
    }

    #[test]
    fn undefined_variable() {
        let s = session();
        assert_eq!(
            resolve(&json!("{{ nope }}"), &s).unwrap_err(),
            EngineError::UndefinedVariable("nope".into())
        );
    }

    #[test]
    fn indexing_into_scalar_is_invalid_path() {
        let s = session();
        let err = resolve(&json!("{{ n[0] }}"), &s).unwrap_err();
        assert_eq!(err.kind(), "InvalidPath");
    }

    #[test]
    fn empty_span_is_invalid_path() {
        let s = session();
        assert_eq!(resolve(&json!("{{ }}"), &s).unwrap_err().kind(), "InvalidPath");
    }
}
