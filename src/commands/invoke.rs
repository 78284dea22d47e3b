use async_trait::async_trait;
use serde_json::Value;

use crate::commands::{ArgShape, Arguments, CommandHandler};
use crate::error::EngineError;
use crate::eval::ExecContext;

/// `invoke <alias> <action> [value] [--param v ...]`
///
/// Target of the `alias.action(...)` rewrite. A positional value is passed
/// as the `value` parameter and piped input as `input`.
pub struct Invoke;

const SHAPE: ArgShape = ArgShape {
    required: &["alias", "action"],
    optional: Some("value"),
    flags: &[],
    open_flags: true,
};

#[async_trait]
impl CommandHandler for Invoke {
    fn summary(&self) -> &'static str {
        "Run a blueprint action on a connection (alias.action(...))"
    }

    fn usage(&self) -> &'static str {
        "invoke <alias> <action> [value] [--param value ...]"
    }

    fn accepts_input(&self, _args: &Arguments) -> bool {
        true
    }

    fn validate(&self, args: &Arguments) -> Result<(), EngineError> {
        SHAPE.check(args)
    }

    async fn execute(
        &self,
        args: Arguments,
        input: Option<Value>,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Value, EngineError> {
        let alias = args.require_text(0, "alias")?;
        let action = args.require_text(1, "action")?;
        let label = format!("{alias}.{action}");

        let Some(conn) = ctx.session.connection(&alias) else {
            return Err(EngineError::handler(
                label,
                format!("no connection named '{alias}' (use: connect <source> --as {alias})"),
            ));
        };
        let source = conn.source.clone();

        let mut params = args.params(&[]);
        if let Some(value) = args.positional.get(2) {
            params.insert("value".into(), value.clone());
        }
        if let Some(input) = input {
            params.insert("input".into(), input);
        }

        log::info!("invoke {label} on {source}");
        ctx.services
            .connector
            .run_action(&source, &action, params)
            .await
            .map_err(|e| EngineError::handler(label, e))
    }
}
