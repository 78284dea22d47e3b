use async_trait::async_trait;
use serde_json::{Value, json};

use crate::commands::{ArgShape, Arguments, CommandHandler, bad_subcommand};
use crate::error::EngineError;
use crate::eval::ExecContext;
use crate::services::{AssetKind, ServiceError};

const SUBCOMMANDS: &[&str] = &["list", "run"];

const RUN_SHAPE: ArgShape = ArgShape {
    required: &[],
    optional: Some("name"),
    flags: &[],
    open_flags: true,
};

/// `flow`, `query` and `script`: list workspace assets of one kind or run
/// one by name. Flags other than `--name` (and `--on` for queries) are
/// forwarded as parameters.
pub struct AssetCommand {
    kind: AssetKind,
}

impl AssetCommand {
    pub fn new(kind: AssetKind) -> Self {
        Self { kind }
    }

    fn structural(&self) -> &'static [&'static str] {
        match self.kind {
            AssetKind::Query => &["name", "on"],
            AssetKind::Flow | AssetKind::Script => &["name"],
        }
    }

    fn reference(&self, args: &Arguments) -> Result<String, EngineError> {
        args.text(0)
            .or_else(|| args.flag_text("name"))
            .ok_or_else(|| EngineError::invalid_args(args.label(), "missing name"))
    }

    async fn run(
        &self,
        args: &Arguments,
        input: Option<Value>,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Value, EngineError> {
        let label = args.label();
        let failed = |e: ServiceError| EngineError::handler(&label, e);

        let reference = self.reference(args)?;
        let asset = ctx
            .services
            .workspace
            .find(self.kind, &reference)
            .await
            .map_err(failed)?;
        let params = args.params(self.structural());
        log::info!("{label} {}", asset.path.display());

        match self.kind {
            AssetKind::Script => ctx
                .services
                .scripts
                .run(&asset.path, input, params)
                .await
                .map_err(failed),
            AssetKind::Flow => {
                let variables = ctx.variables();
                ctx.services
                    .connector
                    .run_flow(&asset.path, params, variables)
                    .await
                    .map_err(failed)
            }
            AssetKind::Query => {
                let conn = match args.flag_text("on") {
                    Some(alias) => ctx.session.connection(&alias).ok_or_else(|| {
                        EngineError::handler(&label, format!("no connection named '{alias}'"))
                    })?,
                    None => ctx.session.active_connection().ok_or_else(|| {
                        EngineError::handler(&label, "no active connection (use --on <alias>)")
                    })?,
                };
                let source = conn.source.clone();
                let sql = tokio::fs::read_to_string(&asset.path)
                    .await
                    .map_err(|e| EngineError::handler(&label, e))?;
                ctx.services
                    .connector
                    .run_query(&source, &sql, params)
                    .await
                    .map_err(failed)
            }
        }
    }
}

#[async_trait]
impl CommandHandler for AssetCommand {
    fn summary(&self) -> &'static str {
        match self.kind {
            AssetKind::Flow => "List or run workflow definitions",
            AssetKind::Query => "List or run SQL queries against a connection",
            AssetKind::Script => "List or run local scripts",
        }
    }

    fn usage(&self) -> &'static str {
        match self.kind {
            AssetKind::Flow => "flow list | run [name] [--name n] [--param value ...]",
            AssetKind::Query => "query list | run [name] [--on alias] [--param value ...]",
            AssetKind::Script => "script list | run [name] [--param value ...]",
        }
    }

    fn takes_subcommand(&self) -> bool {
        true
    }

    fn accepts_input(&self, args: &Arguments) -> bool {
        self.kind != AssetKind::Query && args.subcommand.as_deref() == Some("run")
    }

    fn validate(&self, args: &Arguments) -> Result<(), EngineError> {
        match args.subcommand.as_deref() {
            Some("list") => ArgShape::NONE.check(args),
            Some("run") => {
                RUN_SHAPE.check(args)?;
                self.reference(args).map(drop)
            }
            _ => Err(bad_subcommand(args, SUBCOMMANDS)),
        }
    }

    async fn execute(
        &self,
        args: Arguments,
        input: Option<Value>,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Value, EngineError> {
        match args.subcommand.as_deref() {
            Some("list") => Ok(ctx
                .services
                .workspace
                .list(self.kind)
                .await
                .into_iter()
                .map(|a| {
                    json!({
                        "namespace": a.namespace,
                        "name": a.name,
                        "path": a.path.display().to_string(),
                    })
                })
                .collect()),
            Some("run") => self.run(&args, input, ctx).await,
            _ => Err(bad_subcommand(&args, SUBCOMMANDS)),
        }
    }
}
