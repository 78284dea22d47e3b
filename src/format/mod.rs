//! Output Formatter: renders the terminal result of a pipeline.
//!
//! Directives only apply to the terminal stage of a pipeline that is not
//! captured by an assignment; intermediate stages always see raw values.

mod query;
mod table;

use serde_json::{Map, Value};

use crate::config::OutputConfig;
use crate::error::EngineError;
use crate::value::to_text;


/// Output directives as written (`--output`, `--columns`, `--query`).
/// Validated when rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatOptions {
    pub output: Option<String>,
    pub columns: Option<String>,
    pub query: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Auto,
    Table,
    Json,
    Raw,
}

impl OutputMode {
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s {
            "auto" => Ok(OutputMode::Auto),
            "table" => Ok(OutputMode::Table),
            "json" => Ok(OutputMode::Json),
            "raw" => Ok(OutputMode::Raw),
            other => Err(EngineError::Formatting(format!(
                "unknown output mode '{other}' (expected auto, table, json or raw)"
            ))),
        }
    }
}

impl FormatOptions {
    /// Record `--<flag> value` if `flag` is an output directive (or its
    /// `cx-` alias). Returns false for any other flag.
    pub fn set(&mut self, flag: &str, value: Option<String>) -> bool {
        let slot = match flag.strip_prefix("cx-").unwrap_or(flag) {
            "output" => &mut self.output,
            "columns" => &mut self.columns,
            "query" => &mut self.query,
            _ => return false,
        };
        *slot = Some(value.unwrap_or_else(|| "true".into()));
        true
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_none() && self.columns.is_none() && self.query.is_none()
    }
}

/// Render `value` for display.
pub fn render(
    value: &Value,
    options: &FormatOptions,
    config: &OutputConfig,
) -> Result<String, EngineError> {
    let mode = OutputMode::parse(options.output.as_deref().unwrap_or(&config.default_mode))?;
    let columns = match &options.columns {
        Some(spec) => Some(parse_columns(spec)?),
        None => None,
    };
    if columns.is_some() && matches!(mode, OutputMode::Json | OutputMode::Raw) {
        return Err(EngineError::Formatting(
            "--columns requires table output (auto or table)".into(),
        ));
    }

    let mut value = value.clone();
    if let Some(expr) = &options.query {
        value = query::apply(expr, &unwrap_envelope(value))?;
        log::debug!("query '{expr}' applied");
    }

    match mode {
        OutputMode::Json => pretty(&value),
        OutputMode::Raw => Ok(value.to_string()),
        OutputMode::Table => render_table(unwrap_envelope(value), columns, config),
        OutputMode::Auto => {
            let value = unwrap_envelope(value);
            if columns.is_some() || is_record_list(&value) {
                render_table(value, columns, config)
            } else if let Value::String(s) = value {
                Ok(s)
            } else {
                pretty(&value)
            }
        }
    }
}

/// Fallback rendering when directives fail.
pub fn render_raw(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn pretty(value: &Value) -> Result<String, EngineError> {
    serde_json::to_string_pretty(value).map_err(|e| EngineError::Formatting(e.to_string()))
}

fn parse_columns(spec: &str) -> Result<Vec<String>, EngineError> {
    let cols: Vec<String> = spec
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if cols.is_empty() {
        return Err(EngineError::Formatting("--columns needs at least one name".into()));
    }
    Ok(cols)
}

/// Strip an incidental wrapper: a mapping whose single field holds a
/// mapping or sequence, or a `content` field holding JSON text.
pub fn unwrap_envelope(value: Value) -> Value {
    let Value::Object(map) = value else {
        return value;
    };
    if map.len() != 1 {
        return Value::Object(map);
    }
    let payload = match map.iter().next() {
        Some((_, inner @ (Value::Object(_) | Value::Array(_)))) => Some(inner.clone()),
        Some((key, Value::String(text))) if key == "content" => serde_json::from_str(text).ok(),
        _ => None,
    };
    match payload {
        Some(inner) => {
            log::debug!("unwrapped single-field envelope");
            unwrap_envelope(inner)
        }
        None => Value::Object(map),
    }
}

fn is_record_list(value: &Value) -> bool {
    matches!(value, Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object))
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(v) => to_text(v),
    }
}

fn render_table(
    value: Value,
    columns: Option<Vec<String>>,
    config: &OutputConfig,
) -> Result<String, EngineError> {
    let records: Vec<Map<String, Value>> = match value {
        Value::Array(items) if items.is_empty() => return Ok("(no rows)".into()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => map,
                scalar => Map::from_iter([("value".to_string(), scalar)]),
            })
            .collect(),
        Value::Object(map) => vec![map],
        scalar => vec![Map::from_iter([("value".to_string(), scalar)])],
    };

    // Union of keys, first-seen order.
    let mut headers: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    if let Some(cols) = columns {
        if let Some(missing) = cols.iter().find(|c| !headers.contains(*c)) {
            return Err(EngineError::Formatting(format!(
                "unknown column '{missing}' (available: {})",
                headers.join(", ")
            )));
        }
        headers = cols;
    }

    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| headers.iter().map(|h| cell(r.get(h))).collect())
        .collect();
    Ok(table::render(&headers, &rows, config.max_column_width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts(output: Option<&str>, columns: Option<&str>, query: Option<&str>) -> FormatOptions {
        FormatOptions {
            output: output.map(String::from),
            columns: columns.map(String::from),
            query: query.map(String::from),
        }
    }

    fn cfg() -> OutputConfig {
        OutputConfig::default()
    }

    #[test]
    fn auto_renders_records_as_table() {
        let v = json!([{"a": 1}, {"b": "x"}]);
        let out = render(&v, &FormatOptions::default(), &cfg()).unwrap();
        assert!(out.contains("│ a │ b │"), "{out}");
    }

    #[test]
    fn auto_text_is_verbatim_and_scalars_are_json() {
        assert_eq!(render(&json!("hi"), &FormatOptions::default(), &cfg()).unwrap(), "hi");
        assert_eq!(render(&json!(3), &FormatOptions::default(), &cfg()).unwrap(), "3");
    }

    #[test]
    fn columns_select_subset_of_single_record() {
        let v = json!({"id": 1, "name": "rex", "status": "available", "tags": []});
        let out = render(&v, &opts(Some("table"), Some("name,status"), None), &cfg()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "│ name │ status    │");
        assert_eq!(lines[3], "│ rex  │ available │");
    }

    #[test]
    fn columns_with_json_is_an_error() {
        let err = render(&json!([]), &opts(Some("json"), Some("a"), None), &cfg()).unwrap_err();
        assert_eq!(err.kind(), "FormattingError");
    }

    #[test]
    fn unknown_column_is_an_error() {
        let err = render(&json!({"a": 1, "b": 2}), &opts(None, Some("z"), None), &cfg()).unwrap_err();
        assert!(err.to_string().contains("unknown column 'z'"));
    }

    #[test]
    fn query_targets_payload_not_envelope() {
        let v = json!({"results": [{"name": "rex"}, {"name": "tom"}]});
        let out = render(&v, &opts(Some("raw"), None, Some("map(.name)")), &cfg()).unwrap();
        assert_eq!(out, r#"["rex","tom"]"#);
    }

    #[test]
    fn content_text_envelope_is_decoded() {
        let v = json!({"content": "[{\"a\": 1}]"});
        assert_eq!(unwrap_envelope(v), json!([{"a": 1}]));
    }

    #[test]
    fn single_scalar_field_is_not_unwrapped() {
        let v = json!({"name": "rex"});
        assert_eq!(unwrap_envelope(v.clone()), v);
    }

    #[test]
    fn scalar_sequence_uses_value_column() {
        let out = render(&json!([1, 2]), &opts(Some("table"), None, None), &cfg()).unwrap();
        assert!(out.contains("│ value │"));
    }

    #[test]
    fn unknown_mode_is_formatting_error() {
        assert!(render(&json!(1), &opts(Some("xml"), None, None), &cfg()).is_err());
    }

    #[test]
    fn set_recognises_aliases() {
        let mut o = FormatOptions::default();
        assert!(o.set("cx-output", Some("table".into())));
        assert!(o.set("columns", Some("a".into())));
        assert!(!o.set("limit", Some("3".into())));
        assert_eq!(o.output.as_deref(), Some("table"));
    }
}
