use async_trait::async_trait;
use serde_json::Value;

use crate::commands::{ArgShape, Arguments, CommandHandler};
use crate::error::EngineError;
use crate::eval::ExecContext;
use crate::value::{ValuePath, summarize};

/// `inspect <name>`: type and shape of a stored value.
pub struct Inspect;

#[async_trait]
impl CommandHandler for Inspect {
    fn summary(&self) -> &'static str {
        "Summarise a variable: type, length, keys and a preview"
    }

    fn usage(&self) -> &'static str {
        "inspect <name>"
    }

    fn validate(&self, args: &Arguments) -> Result<(), EngineError> {
        ArgShape::positional(&["name"]).check(args)
    }

    async fn execute(
        &self,
        args: Arguments,
        _input: Option<Value>,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Value, EngineError> {
        let reference = args.require_text(0, "name")?;
        let path = ValuePath::parse(&reference)?;
        let root = ctx.session.get_variable(&path.root)?;
        Ok(summarize(&reference, path.lookup(root)?))
    }
}
