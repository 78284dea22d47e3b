//! Error taxonomy shared by every layer of the engine.

use std::fmt;

use thiserror::Error;

/// Every failure the engine can report for one line of input.
///
/// Nothing here is fatal to the process: the REPL prints the error and
/// returns to the prompt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Lex or parse failure. `position` is a 0-based character offset into the line.
    #[error("{message} at column {}{}", .position + 1, expected_hint(.expected))]
    Syntax {
        message: String,
        position: usize,
        expected: Option<String>,
    },

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{command}: {reason}")]
    InvalidArguments { command: String, reason: String },

    #[error("variable '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("cannot resolve '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Execute-time failure inside a handler, including collaborator errors.
    #[error("{command} failed: {message}")]
    HandlerFailure { command: String, message: String },

    #[error("{0}")]
    Formatting(String),

    #[error("interrupted")]
    Interrupted,
}

fn expected_hint(expected: &Option<String>) -> String {
    match expected {
        Some(e) => format!(" (expected {e})"),
        None => String::new(),
    }
}

impl EngineError {
    /// The taxonomy name shown to the operator.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Syntax { .. } => "SyntaxError",
            EngineError::UnknownCommand(_) => "UnknownCommand",
            EngineError::InvalidArguments { .. } => "InvalidArguments",
            EngineError::UndefinedVariable(_) => "UndefinedVariable",
            EngineError::InvalidPath { .. } => "InvalidPath",
            EngineError::HandlerFailure { .. } => "HandlerFailure",
            EngineError::Formatting(_) => "FormattingError",
            EngineError::Interrupted => "Interrupted",
        }
    }

    pub fn syntax(message: impl Into<String>, position: usize, expected: Option<&str>) -> Self {
        EngineError::Syntax {
            message: message.into(),
            position,
            expected: expected.map(String::from),
        }
    }

    pub fn invalid_args(command: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InvalidArguments {
            command: command.into(),
            reason: reason.into(),
        }
    }

    pub fn handler(command: impl Into<String>, message: impl fmt::Display) -> Self {
        EngineError::HandlerFailure {
            command: command.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A failed pipeline: the first failing stage and its error.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct PipelineError {
    /// 1-based stage index in execution order; `None` before any stage ran
    /// (syntax errors, unknown commands rejected while building).
    pub stage: Option<usize>,
    pub command: Option<String>,
    #[source]
    pub error: EngineError,
}

impl PipelineError {
    pub fn new(error: EngineError) -> Self {
        Self {
            stage: None,
            command: None,
            error,
        }
    }

    pub fn at_stage(stage: usize, command: impl Into<String>, error: EngineError) -> Self {
        Self {
            stage: Some(stage),
            command: Some(command.into()),
            error,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.error.kind()
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.stage, &self.command) {
            (Some(stage), Some(cmd)) => {
                write!(f, "{} in stage {stage} ({cmd}): {}", self.kind(), self.error)
            }
            _ => write!(f, "{}: {}", self.kind(), self.error),
        }
    }
}

impl From<EngineError> for PipelineError {
    fn from(error: EngineError) -> Self {
        PipelineError::new(error)
    }
}
