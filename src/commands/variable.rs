use async_trait::async_trait;
use serde_json::{Value, json};

use crate::commands::{ArgShape, Arguments, CommandHandler, bad_subcommand};
use crate::error::EngineError;
use crate::eval::ExecContext;
use crate::value::{ValuePath, type_name};

const SUBCOMMANDS: &[&str] = &["list", "get", "rm", "clear"];

/// `var list | get <name> | rm <name> | clear`
pub struct Var;

#[async_trait]
impl CommandHandler for Var {
    fn summary(&self) -> &'static str {
        "List, read or delete session variables"
    }

    fn usage(&self) -> &'static str {
        "var list | get <name> | rm <name> | clear"
    }

    fn takes_subcommand(&self) -> bool {
        true
    }

    fn validate(&self, args: &Arguments) -> Result<(), EngineError> {
        match args.subcommand.as_deref() {
            Some("list" | "clear") => ArgShape::NONE.check(args),
            Some("get" | "rm") => ArgShape::positional(&["name"]).check(args),
            _ => Err(bad_subcommand(args, SUBCOMMANDS)),
        }
    }

    async fn execute(
        &self,
        args: Arguments,
        _input: Option<Value>,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Value, EngineError> {
        match args.subcommand.as_deref() {
            Some("list") => {
                let rows = ctx
                    .session
                    .list_variables()
                    .map(|v| {
                        json!({
                            "name": v.name,
                            "type": type_name(&v.value),
                            "source": v.source,
                            "created_at": v.created_at,
                        })
                    })
                    .collect();
                Ok(Value::Array(rows))
            }
            Some("get") => {
                // `var get pets[0].name` walks into the value.
                let path = ValuePath::parse(&args.require_text(0, "name")?)?;
                let root = ctx.session.get_variable(&path.root)?;
                path.lookup(root).cloned()
            }
            Some("rm") => {
                let name = args.require_text(0, "name")?;
                ctx.session.remove_variable(&name)?;
                Ok(json!({"removed": name}))
            }
            Some("clear") => Ok(json!({"cleared": ctx.session.clear_variables()})),
            _ => Err(bad_subcommand(&args, SUBCOMMANDS)),
        }
    }
}
