use async_trait::async_trait;
use serde_json::{Value, json};

use crate::commands::{ArgShape, Arguments, CommandHandler};
use crate::error::EngineError;
use crate::eval::ExecContext;

/// `echo <value>`
pub struct Echo;

#[async_trait]
impl CommandHandler for Echo {
    fn summary(&self) -> &'static str {
        "Return the argument unchanged"
    }

    fn usage(&self) -> &'static str {
        "echo <value>"
    }

    fn validate(&self, args: &Arguments) -> Result<(), EngineError> {
        ArgShape::positional(&["value"]).check(args)
    }

    async fn execute(
        &self,
        mut args: Arguments,
        _input: Option<Value>,
        _ctx: &mut ExecContext<'_>,
    ) -> Result<Value, EngineError> {
        Ok(args.positional.swap_remove(0))
    }
}

/// `format`: holds output directives; the value passes through.
pub struct Format;

#[async_trait]
impl CommandHandler for Format {
    fn summary(&self) -> &'static str {
        "Pass piped input through so output flags can be applied to it"
    }

    fn usage(&self) -> &'static str {
        "format [--output mode] [--columns a,b] [--query expr]"
    }

    fn accepts_input(&self, _args: &Arguments) -> bool {
        true
    }

    fn validate(&self, args: &Arguments) -> Result<(), EngineError> {
        ArgShape::NONE.check(args)
    }

    async fn execute(
        &self,
        _args: Arguments,
        input: Option<Value>,
        _ctx: &mut ExecContext<'_>,
    ) -> Result<Value, EngineError> {
        Ok(input.unwrap_or(Value::Null))
    }
}

/// `help`
pub struct Help;

#[async_trait]
impl CommandHandler for Help {
    fn summary(&self) -> &'static str {
        "List available commands"
    }

    fn usage(&self) -> &'static str {
        "help"
    }

    fn validate(&self, args: &Arguments) -> Result<(), EngineError> {
        ArgShape::NONE.check(args)
    }

    async fn execute(
        &self,
        _args: Arguments,
        _input: Option<Value>,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Value, EngineError> {
        Ok(ctx
            .registry
            .iter()
            .map(|(name, h)| {
                json!({
                    "command": name,
                    "usage": h.usage(),
                    "summary": h.summary(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::Harness;

    #[tokio::test]
    async fn echo_preserves_type() {
        let mut h = Harness::new();
        let out = h.run(&Echo, "", &[json!([1, {"a": true}])], None).await.unwrap();
        assert_eq!(out, json!([1, {"a": true}]));
    }

    #[tokio::test]
    async fn format_passes_input_through() {
        let mut h = Harness::new();
        let out = h.run(&Format, "", &[], Some(json!({"k": 1}))).await.unwrap();
        assert_eq!(out, json!({"k": 1}));
        assert_eq!(h.run(&Format, "", &[], None).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn help_lists_registered_commands_sorted() {
        let mut h = Harness::new();
        let out = h.run(&Help, "", &[], None).await.unwrap();
        let names: Vec<&str> = out
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["command"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"connect"));
        assert!(names.contains(&"var"));
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
