use async_trait::async_trait;
use serde_json::{Value, json};

use crate::commands::{ArgShape, Arguments, CommandHandler};
use crate::error::EngineError;
use crate::eval::ExecContext;
use crate::value::is_identifier;

/// `connect <source> --as <alias>`
pub struct Connect;

const CONNECT_SHAPE: ArgShape = ArgShape {
    required: &["source"],
    optional: None,
    flags: &["as"],
    open_flags: false,
};

#[async_trait]
impl CommandHandler for Connect {
    fn summary(&self) -> &'static str {
        "Open a connection to a blueprint-backed source and make it active"
    }

    fn usage(&self) -> &'static str {
        "connect <source> --as <alias>"
    }

    fn validate(&self, args: &Arguments) -> Result<(), EngineError> {
        CONNECT_SHAPE.check(args)?;
        match args.flag_text("as") {
            None => Err(EngineError::invalid_args("connect", "missing --as <alias>")),
            Some(alias) if !is_identifier(&alias) => Err(EngineError::invalid_args(
                "connect",
                format!("invalid alias '{alias}'"),
            )),
            Some(_) => Ok(()),
        }
    }

    async fn execute(
        &self,
        args: Arguments,
        _input: Option<Value>,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Value, EngineError> {
        let source = args.require_text(0, "source")?;
        let alias = args
            .flag_text("as")
            .ok_or_else(|| EngineError::invalid_args("connect", "missing --as <alias>"))?;

        ctx.services
            .connector
            .test_connection(&source)
            .await
            .map_err(|e| EngineError::handler("connect", e))?;

        let conn = ctx.session.add_connection(&alias, &source);
        log::info!("connected '{}' to {}", conn.alias, conn.source);
        Ok(json!({
            "alias": conn.alias,
            "source": conn.source,
            "status": "connected",
        }))
    }
}

/// `connections`
pub struct Connections;

#[async_trait]
impl CommandHandler for Connections {
    fn summary(&self) -> &'static str {
        "List open connections"
    }

    fn usage(&self) -> &'static str {
        "connections"
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
        let active = ctx.session.active_connection().map(|c| c.alias.clone());
        let rows = ctx
            .session
            .list_connections()
            .map(|c| {
                json!({
                    "alias": c.alias,
                    "source": c.source,
                    "created_at": c.created_at,
                    "active": active.as_deref() == Some(c.alias.as_str()),
                })
            })
            .collect();
        Ok(Value::Array(rows))
    }
}

/// `disconnect <alias>`
pub struct Disconnect;

#[async_trait]
impl CommandHandler for Disconnect {
    fn summary(&self) -> &'static str {
        "Close a connection"
    }

    fn usage(&self) -> &'static str {
        "disconnect <alias>"
    }

    fn validate(&self, args: &Arguments) -> Result<(), EngineError> {
        ArgShape::positional(&["alias"]).check(args)
    }

    async fn execute(
        &self,
        args: Arguments,
        _input: Option<Value>,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Value, EngineError> {
        let alias = args.require_text(0, "alias")?;
        match ctx.session.remove_connection(&alias) {
            Some(conn) => Ok(json!({"alias": conn.alias, "status": "disconnected"})),
            None => Err(EngineError::handler(
                "disconnect",
                format!("no connection named '{alias}'"),
            )),
        }
    }
}
