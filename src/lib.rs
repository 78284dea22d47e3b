//! cx-shell: an interactive shell for composing data-workflow commands
//! against blueprint-backed services.
//!
//! One line of input is parsed into a tree, lowered into command intents,
//! and run as a left-to-right pipeline whose result is either bound to a
//! session variable or rendered for display. [`Engine`] ties the stages
//! together and is the entry point for embedding and tests.
//!
//! # Architecture
//!
//! - **[`parse`]**: lexer and grammar producing a [`parse::ParseNode`] tree.
//! - **[`ast`]**: lowers the tree into a [`ast::Program`] of command intents.
//! - **[`eval`]**: command registry, template resolution, pipeline executor and the engine.
//! - **[`commands`]**: the [`commands::CommandHandler`] trait and built-in handlers.
//! - **[`session`]**: variables, connections and the snapshot document.
//! - **[`format`]**: output directives, tables and jq queries.
//! - **[`services`]**: async contracts for connectors, scripts, snapshots and prompts.
//! - **[`config`]**: embedded defaults merged with a user overlay.
//! - **[`logging`]**: file logging and the pipeline history record.
//! - **[`repl`]**: the interactive loop.

pub mod ast;
pub mod commands;
/// Configuration types, loading, and overlay merge logic.
pub mod config;
pub mod error;
pub mod eval;
pub mod format;
/// File logging and pipeline history.
pub mod logging;
pub mod parse;
pub mod repl;
pub mod services;
pub mod session;
/// Value paths, type names and summaries.
pub mod value;

pub use config::Config;
pub use error::{EngineError, PipelineError};
pub use eval::{Engine, Outcome};
pub use services::Services;
