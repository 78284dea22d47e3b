use async_trait::async_trait;
use serde_json::{Value, json};

use crate::commands::{ArgShape, Arguments, CommandHandler, bad_subcommand};
use crate::error::EngineError;
use crate::eval::ExecContext;
use crate::value::is_identifier;

const SUBCOMMANDS: &[&str] = &["list", "save", "load", "rm", "status"];

const RM_SHAPE: ArgShape = ArgShape {
    required: &["name"],
    optional: None,
    flags: &["yes"],
    open_flags: false,
};

/// `session list | save <name> | load <name> | rm <name> [--yes] | status`
///
/// `load` replaces the live session wholesale; nothing is merged.
pub struct SessionCommand;

impl SessionCommand {
    fn name(args: &Arguments) -> Result<String, EngineError> {
        let name = args.require_text(0, "name")?;
        if !is_identifier(&name) {
            return Err(EngineError::invalid_args(
                args.label(),
                format!("invalid session name '{name}'"),
            ));
        }
        Ok(name)
    }
}

#[async_trait]
impl CommandHandler for SessionCommand {
    fn summary(&self) -> &'static str {
        "Save, load and manage persisted sessions"
    }

    fn usage(&self) -> &'static str {
        "session list | save <name> | load <name> | rm <name> [--yes] | status"
    }

    fn takes_subcommand(&self) -> bool {
        true
    }

    fn validate(&self, args: &Arguments) -> Result<(), EngineError> {
        match args.subcommand.as_deref() {
            Some("list" | "status") => ArgShape::NONE.check(args),
            Some("save" | "load") => {
                ArgShape::positional(&["name"]).check(args)?;
                Self::name(args).map(drop)
            }
            Some("rm") => {
                RM_SHAPE.check(args)?;
                Self::name(args).map(drop)
            }
            _ => Err(bad_subcommand(args, SUBCOMMANDS)),
        }
    }

    async fn execute(
        &self,
        args: Arguments,
        _input: Option<Value>,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Value, EngineError> {
        let label = args.label();
        let store = &ctx.services.snapshots;
        match args.subcommand.as_deref() {
            Some("list") => {
                let names = store
                    .list()
                    .await
                    .map_err(|e| EngineError::handler(&label, e))?;
                Ok(Value::Array(
                    names.into_iter().map(|n| json!({"name": n})).collect(),
                ))
            }
            Some("save") => {
                let name = Self::name(&args)?;
                let doc = ctx.session.snapshot();
                store
                    .save(&name, &doc)
                    .await
                    .map_err(|e| EngineError::handler(&label, e))?;
                log::info!("session saved as '{name}'");
                Ok(json!({
                    "saved": name,
                    "variables": doc["variables"].as_array().map_or(0, Vec::len),
                    "connections": doc["connections"].as_array().map_or(0, Vec::len),
                }))
            }
            Some("load") => {
                let name = Self::name(&args)?;
                let doc = store
                    .load(&name)
                    .await
                    .map_err(|e| EngineError::handler(&label, e))?;
                ctx.session
                    .restore(&doc)
                    .map_err(|e| EngineError::handler(&label, e))?;
                log::info!("session '{name}' loaded");
                Ok(json!({
                    "loaded": name,
                    "variables": ctx.session.list_variables().count(),
                    "connections": ctx.session.list_connections().count(),
                }))
            }
            Some("rm") => {
                let name = Self::name(&args)?;
                if !args.flag_bool("yes")
                    && !ctx
                        .services
                        .prompter
                        .confirm(&format!("Delete saved session '{name}'?"))
                        .await
                {
                    return Ok(json!({"removed": Value::Null, "status": "cancelled"}));
                }
                store
                    .remove(&name)
                    .await
                    .map_err(|e| EngineError::handler(&label, e))?;
                Ok(json!({"removed": name}))
            }
            Some("status") => Ok(json!({
                "variables": ctx.session.list_variables().count(),
                "connections": ctx.session.list_connections().count(),
                "active": ctx.session.active_connection().map(|c| c.alias.clone()),
            })),
            _ => Err(bad_subcommand(&args, SUBCOMMANDS)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::Harness;
    use crate::services::Decline;
    use std::sync::Arc;

    #[tokio::test]
    async fn save_then_load_replaces_session() {
        let mut h = Harness::new();
        h.session.set_variable("pets", json!([{"id": 1}]), "pets = ...");
        h.session.add_connection("api", "user:petstore");
        h.run(&SessionCommand, "save", &[json!("work")], None).await.unwrap();

        h.session.clear_variables();
        h.session.set_variable("scratch", json!(1), "");
        let out = h.run(&SessionCommand, "load", &[json!("work")], None).await.unwrap();
        assert_eq!(out, json!({"loaded": "work", "variables": 1, "connections": 1}));
        assert!(h.session.variable("scratch").is_none());
        assert_eq!(h.session.get_variable("pets").unwrap(), &json!([{"id": 1}]));
        assert_eq!(h.session.active_connection().unwrap().alias, "api");
    }

    #[tokio::test]
    async fn load_missing_fails_and_keeps_session() {
        let mut h = Harness::new();
        h.session.set_variable("x", json!(1), "");
        let err = h
            .run(&SessionCommand, "load", &[json!("ghost")], None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "HandlerFailure");
        assert!(err.to_string().contains("session 'ghost' not found"));
        assert!(h.session.variable("x").is_some());
    }

    #[tokio::test]
    async fn rm_declined_keeps_snapshot() {
        let mut h = Harness::with_prompter(Arc::new(Decline));
        h.run(&SessionCommand, "save", &[json!("keep")], None).await.unwrap();
        let out = h.run(&SessionCommand, "rm", &[json!("keep")], None).await.unwrap();
        assert_eq!(out["status"], "cancelled");
        let list = h.run(&SessionCommand, "list", &[], None).await.unwrap();
        assert_eq!(list, json!([{"name": "keep"}]));
    }

    #[tokio::test]
    async fn rm_with_yes_skips_prompt() {
        let mut h = Harness::with_prompter(Arc::new(Decline));
        h.run(&SessionCommand, "save", &[json!("old")], None).await.unwrap();
        let out = h
            .run_with(&SessionCommand, "rm", &[json!("old")], &[("yes", json!(true))], None)
            .await
            .unwrap();
        assert_eq!(out, json!({"removed": "old"}));
    }

    #[tokio::test]
    async fn status_reports_active() {
        let mut h = Harness::new();
        h.session.add_connection("db", "user:pg");
        let out = h.run(&SessionCommand, "status", &[], None).await.unwrap();
        assert_eq!(out, json!({"variables": 0, "connections": 1, "active": "db"}));
    }

    #[tokio::test]
    async fn rejects_path_like_names() {
        let mut h = Harness::new();
        let err = h
            .run(&SessionCommand, "save", &[json!("../etc")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArguments { .. }));
    }
}
