//! Command handlers: one [`CommandHandler`] per registered command name.
//!
//! Handlers declare their argument shape and validate against it before any
//! side effect; all session mutation and collaborator calls happen in
//! `execute`.

/// `flow`, `query`, `script`: workspace asset listing and execution.
pub mod assets;
/// `echo`, `format`, `help`.
pub mod builtin;
/// `connect`, `connections`, `disconnect`.
pub mod connection;
/// `inspect`: structured summary of a variable.
pub mod inspect;
/// `invoke`: run a blueprint action on a connection.
pub mod invoke;
/// `session`: persisted snapshots.
pub mod session;
/// `var`: session variable management.
pub mod variable;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::eval::ExecContext;
use crate::value::to_text;

/// Resolved arguments for one dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    pub command: String,
    pub subcommand: Option<String>,
    pub positional: Vec<Value>,
    pub flags: Map<String, Value>,
}

impl Arguments {
    /// `command` or `command subcommand`, for messages.
    pub fn label(&self) -> String {
        match &self.subcommand {
            Some(sub) => format!("{} {sub}", self.command),
            None => self.command.clone(),
        }
    }

    pub fn text(&self, index: usize) -> Option<String> {
        self.positional.get(index).map(to_text)
    }

    pub fn require_text(&self, index: usize, what: &str) -> Result<String, EngineError> {
        self.text(index)
            .ok_or_else(|| EngineError::invalid_args(self.label(), format!("missing {what}")))
    }

    pub fn flag(&self, name: &str) -> Option<&Value> {
        self.flags.get(name)
    }

    pub fn flag_text(&self, name: &str) -> Option<String> {
        self.flags.get(name).map(to_text)
    }

    /// True for a bare `--name` or an explicit truthy value.
    pub fn flag_bool(&self, name: &str) -> bool {
        match self.flags.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.as_str(), "true" | "yes" | "1"),
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            _ => false,
        }
    }

    /// Every flag except `structural` ones, as collaborator parameters.
    pub fn params(&self, structural: &[&str]) -> Map<String, Value> {
        self.flags
            .iter()
            .filter(|(k, _)| !structural.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Declared argument shape. At most one optional positional is allowed;
/// anything else optional must be a named flag.
#[derive(Debug, Clone, Copy)]
pub struct ArgShape {
    pub required: &'static [&'static str],
    pub optional: Option<&'static str>,
    pub flags: &'static [&'static str],
    /// Accept any flag (parameters forwarded to a collaborator).
    pub open_flags: bool,
}

impl ArgShape {
    pub const NONE: ArgShape = ArgShape {
        required: &[],
        optional: None,
        flags: &[],
        open_flags: false,
    };

    pub const fn positional(required: &'static [&'static str]) -> Self {
        ArgShape {
            required,
            optional: None,
            flags: &[],
            open_flags: false,
        }
    }

    pub fn check(&self, args: &Arguments) -> Result<(), EngineError> {
        let label = args.label();
        let given = args.positional.len();
        if given < self.required.len() {
            return Err(EngineError::invalid_args(
                label,
                format!("missing {}", self.required[given]),
            ));
        }
        let max = self.required.len() + usize::from(self.optional.is_some());
        if given > max {
            return Err(EngineError::invalid_args(
                label,
                format!(
                    "unexpected argument '{}' (use --name value for optional parameters)",
                    to_text(&args.positional[max])
                ),
            ));
        }
        if !self.open_flags
            && let Some(unknown) = args.flags.keys().find(|k| !self.flags.contains(&k.as_str()))
        {
            return Err(EngineError::invalid_args(label, format!("unknown flag '--{unknown}'")));
        }
        Ok(())
    }
}

/// Error for a missing or unrecognised subcommand.
pub fn bad_subcommand(args: &Arguments, expected: &[&str]) -> EngineError {
    let reason = match &args.subcommand {
        Some(sub) => format!("unknown subcommand '{sub}' (expected one of: {})", expected.join(", ")),
        None => format!("missing subcommand (expected one of: {})", expected.join(", ")),
    };
    EngineError::invalid_args(args.command.clone(), reason)
}

/// A registered command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// One-line description for `help`.
    fn summary(&self) -> &'static str;

    /// Usage line for `help`.
    fn usage(&self) -> &'static str;

    /// Whether the first bare word after the name is a subcommand.
    fn takes_subcommand(&self) -> bool {
        false
    }

    /// Whether this invocation can receive piped input.
    fn accepts_input(&self, _args: &Arguments) -> bool {
        false
    }

    /// Check arguments against the declared shape. Must not have side effects.
    fn validate(&self, args: &Arguments) -> Result<(), EngineError>;

    async fn execute(
        &self,
        args: Arguments,
        input: Option<Value>,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Value, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(positional: Vec<Value>, flags: &[(&str, Value)]) -> Arguments {
        Arguments {
            command: "x".into(),
            subcommand: None,
            positional,
            flags: flags.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        }
    }

    const SHAPE: ArgShape = ArgShape {
        required: &["name"],
        optional: Some("value"),
        flags: &["as"],
        open_flags: false,
    };

    #[test]
    fn shape_accepts_required_plus_one_optional() {
        assert!(SHAPE.check(&args(vec![json!("a")], &[])).is_ok());
        assert!(SHAPE.check(&args(vec![json!("a"), json!(1)], &[("as", json!("b"))])).is_ok());
    }

    #[test]
    fn shape_rejects_missing_and_extra() {
        let err = SHAPE.check(&args(vec![], &[])).unwrap_err();
        assert_eq!(err.to_string(), "x: missing name");
        let err = SHAPE
            .check(&args(vec![json!("a"), json!(1), json!(2)], &[]))
            .unwrap_err();
        assert!(err.to_string().contains("unexpected argument '2'"));
    }

    #[test]
    fn shape_rejects_unknown_flag() {
        let err = SHAPE.check(&args(vec![json!("a")], &[("bogus", json!(true))])).unwrap_err();
        assert_eq!(err.to_string(), "x: unknown flag '--bogus'");
    }

    #[test]
    fn params_skip_structural_flags() {
        let a = args(vec![], &[("on", json!("db")), ("limit", json!(5))]);
        let p = a.params(&["on"]);
        assert_eq!(Value::Object(p), json!({"limit": 5}));
    }

    #[test]
    fn flag_bool_forms() {
        let a = args(vec![], &[("yes", json!(true)), ("dry", json!("no"))]);
        assert!(a.flag_bool("yes"));
        assert!(!a.flag_bool("dry"));
        assert!(!a.flag_bool("missing"));
    }

    #[test]
    fn subcommand_errors_list_choices() {
        let mut a = args(vec![], &[]);
        assert_eq!(
            bad_subcommand(&a, &["list", "get"]).to_string(),
            "x: missing subcommand (expected one of: list, get)"
        );
        a.subcommand = Some("frob".into());
        assert!(bad_subcommand(&a, &["list"]).to_string().contains("unknown subcommand 'frob'"));
    }
}
