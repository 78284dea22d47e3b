//! `--query` expressions, evaluated with jaq (jq syntax).

use jaq_core::load::{Arena, File, Loader};
use jaq_core::{Compiler, Ctx, Vars, data, unwrap_valr};
use jaq_json::Val;
use serde_json::Value;

use crate::error::EngineError;

/// Apply `expr` to `input`. One output is returned as is, several are
/// collected into a sequence, none yields null.
pub fn apply(expr: &str, input: &Value) -> Result<Value, EngineError> {
    let program = File {
        code: expr,
        path: (),
    };

    let loader = Loader::new(
        jaq_core::defs()
            .chain(jaq_std::defs())
            .chain(jaq_json::defs()),
    );
    let arena = Arena::default();
    let modules = loader.load(&arena, program).map_err(|errs| {
        EngineError::Formatting(format!("cannot parse query '{expr}': {errs:?}"))
    })?;

    let filter = Compiler::<_, data::JustLut<Val>>::default()
        .with_funs(
            jaq_core::funs()
                .chain(jaq_std::funs())
                .chain(jaq_json::funs()),
        )
        .compile(modules)
        .map_err(|errs| {
            EngineError::Formatting(format!("cannot compile query '{expr}': {errs:?}"))
        })?;

    let bytes = serde_json::to_vec(input)
        .map_err(|e| EngineError::Formatting(format!("cannot encode value for query: {e}")))?;
    let val = match jaq_json::read::parse_many(&bytes).next() {
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            return Err(EngineError::Formatting(format!(
                "cannot read value for query: {e}"
            )));
        }
        None => Val::Null,
    };

    let ctx = Ctx::<data::JustLut<Val>>::new(&filter.lut, Vars::new([]));
    let mut outputs = Vec::new();
    for result in filter.id.run((ctx.clone(), val)).map(unwrap_valr) {
        let out = result
            .map_err(|e| EngineError::Formatting(format!("query '{expr}' failed: {e:?}")))?;
        outputs.push(to_json(&out));
    }

    Ok(match outputs.len() {
        0 => Value::Null,
        1 => outputs.remove(0),
        _ => Value::Array(outputs),
    })
}

fn to_json(val: &Val) -> Value {
    let text = format!("{val}");
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity() {
        let v = json!({"a": [1, 2]});
        assert_eq!(apply(".", &v).unwrap(), v);
    }

    #[test]
    fn field_projection() {
        let v = json!([{"name": "rex", "age": 3}, {"name": "tom", "age": 5}]);
        assert_eq!(apply("map(.name)", &v).unwrap(), json!(["rex", "tom"]));
    }

    #[test]
    fn multiple_outputs_collected() {
        let v = json!([{"name": "rex"}, {"name": "tom"}]);
        assert_eq!(apply(".[].name", &v).unwrap(), json!(["rex", "tom"]));
    }

    #[test]
    fn no_output_is_null() {
        assert_eq!(apply("empty", &json!(1)).unwrap(), Value::Null);
    }

    #[test]
    fn core_filters_are_available() {
        assert_eq!(apply(". + 1", &json!(1)).unwrap(), json!(2));
        let v = json!([{"ok": true}, {"ok": false}]);
        assert_eq!(apply("map(select(.ok | not))", &v).unwrap(), json!([{"ok": false}]));
    }

    #[test]
    fn bad_expression_is_formatting_error() {
        assert!(matches!(
            apply(".[", &json!(1)),
            Err(EngineError::Formatting(_))
        ));
    }
}
