//! Typed command intents built from the parse tree.

mod build;

pub use build::build;

use serde_json::{Map, Value};

use crate::format::FormatOptions;
use crate::parse::Span;

/// One command to dispatch. Built fresh per line and owned by the executor
/// for the lifetime of one pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandIntent {
    pub name: String,
    pub subcommand: Option<String>,
    /// Values as written; `{{ }}` templates are resolved at dispatch time.
    pub positional: Vec<Value>,
    /// Unique per intent; the last occurrence of a flag wins.
    pub flags: Map<String, Value>,
    /// Set on every stage that follows a `|`.
    pub implicit_input: bool,
    pub span: Span,
}

impl CommandIntent {
    pub fn label(&self) -> String {
        match &self.subcommand {
            Some(sub) => format!("{} {sub}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Command(CommandIntent),
    /// A parenthesised sub-pipeline, run to completion before its result is
    /// threaded onward.
    Group(Pipeline),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    /// Output directives of the terminal stage.
    pub format: FormatOptions,
}

/// A whole input line.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// `name = ...`: bind the result instead of rendering it.
    pub assign_to: Option<String>,
    pub pipeline: Pipeline,
}

impl Pipeline {
    /// Number of command dispatches, counting into groups.
    pub fn command_count(&self) -> usize {
        self.stages
            .iter()
            .map(|s| match s {
                Stage::Command(_) => 1,
                Stage::Group(p) => p.command_count(),
            })
            .sum()
    }
}
