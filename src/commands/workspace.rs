use async_trait::async_trait;
use serde_json::{Value, json};

use crate::commands::{ArgShape, Arguments, CommandHandler, bad_subcommand};
use crate::config::expand_path;
use crate::error::EngineError;
use crate::eval::ExecContext;
use crate::services::assets::Root;

const SUBCOMMANDS: &[&str] = &["list", "add", "remove"];

/// `workspace list | add <path> | remove <namespace|path>`
///
/// Changes last for the running shell; persistent roots belong in the
/// `[workspace]` config section.
pub struct WorkspaceCommand;

fn root_row(root: &Root) -> Value {
    json!({
        "namespace": root.namespace,
        "path": root.path.display().to_string(),
        "system": root.is_system(),
    })
}

#[async_trait]
impl CommandHandler for WorkspaceCommand {
    fn summary(&self) -> &'static str {
        "List, add or remove asset roots"
    }

    fn usage(&self) -> &'static str {
        "workspace list | add <path> | remove <namespace|path>"
    }

    fn takes_subcommand(&self) -> bool {
        true
    }

    fn validate(&self, args: &Arguments) -> Result<(), EngineError> {
        match args.subcommand.as_deref() {
            Some("list") => ArgShape::NONE.check(args),
            Some("add") => ArgShape::positional(&["path"]).check(args),
            Some("remove") => ArgShape::positional(&["root"]).check(args),
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
        let workspace = &ctx.services.workspace;
        match args.subcommand.as_deref() {
            Some("list") => Ok(workspace.roots().iter().map(root_row).collect()),
            Some("add") => {
                let path = expand_path(&args.require_text(0, "path")?);
                let root = workspace
                    .add_root(&path)
                    .await
                    .map_err(|e| EngineError::handler(&label, e))?;
                log::info!("workspace root '{}' added at {}", root.namespace, root.path.display());
                Ok(json!({"added": root_row(&root)}))
            }
            Some("remove") => {
                let reference = args.require_text(0, "root")?;
                let root = workspace
                    .remove_root(&reference)
                    .await
                    .map_err(|e| EngineError::handler(&label, e))?;
                log::info!("workspace root '{}' removed", root.namespace);
                Ok(json!({"removed": root_row(&root)}))
            }
            _ => Err(bad_subcommand(&args, SUBCOMMANDS)),
        }
    }
}
