use serde_json::{Map, Value};

use super::{CommandIntent, Pipeline, Program, Stage};
use crate::error::EngineError;
use crate::eval::CommandRegistry;
use crate::format::FormatOptions;
use crate::parse::{ParseNode, Span};
use crate::value::{is_identifier, to_text};

/// Convert a parse tree into a [`Program`].
///
/// Command names are checked against `registry` here; subcommands are left
/// to each handler. `alias.action(...)` calls with no exact registration
/// become `invoke alias action ...`, and a bare unknown identifier becomes
/// `var get <name>`.
pub fn build(node: ParseNode, registry: &CommandRegistry) -> Result<Program, EngineError> {
    let (assign_to, expr) = match node {
        ParseNode::Assignment { target, expr, .. } => (Some(target), *expr),
        other => (None, other),
    };
    let pipeline = build_pipeline(expr, registry, false)?;
    log::debug!(
        "built {} stage(s), {} command(s){}",
        pipeline.stages.len(),
        pipeline.command_count(),
        assign_to
            .as_ref()
            .map(|t| format!(", bound to '{t}'"))
            .unwrap_or_default()
    );
    Ok(Program {
        assign_to,
        pipeline,
    })
}

fn flatten(node: ParseNode, out: &mut Vec<ParseNode>) {
    match node {
        ParseNode::Pipe { left, right } => {
            flatten(*left, out);
            out.push(*right);
        }
        other => out.push(other),
    }
}

/// `piped`: the first stage receives input from an enclosing pipe.
fn build_pipeline(
    node: ParseNode,
    registry: &CommandRegistry,
    piped: bool,
) -> Result<Pipeline, EngineError> {
    let mut nodes = Vec::new();
    flatten(node, &mut nodes);
    let last = nodes.len().saturating_sub(1);

    let mut stages = Vec::with_capacity(nodes.len());
    let mut format = FormatOptions::default();

    for (i, node) in nodes.into_iter().enumerate() {
        let receives_input = piped || i > 0;
        let mut directives = FormatOptions::default();

        let stage = match node {
            ParseNode::Call {
                name,
                span,
                positional,
                flags,
            } => Stage::Command(build_intent(
                name,
                span,
                positional,
                flags,
                receives_input,
                registry,
                &mut directives,
            )?),
            ParseNode::Group { inner, flags, .. } => {
                let inner = build_pipeline(*inner, registry, receives_input)?;
                directives = inner.format.clone();
                for flag in flags {
                    let (name, value) = flag_parts(flag);
                    if !directives.set(&name, value.as_ref().map(to_text)) {
                        return Err(EngineError::invalid_args(
                            "( )",
                            format!("only output directives may follow a group, found '--{name}'"),
                        ));
                    }
                }
                Stage::Group(inner)
            }
            other => {
                return Err(EngineError::syntax(
                    "expected a command",
                    other.span().start,
                    None,
                ));
            }
        };

        if i == last {
            format = directives;
        } else if !directives.is_empty() {
            log::debug!("ignoring output directives on non-terminal stage {}", i + 1);
        }
        stages.push(stage);
    }

    Ok(Pipeline { stages, format })
}

fn flag_parts(node: ParseNode) -> (String, Option<Value>) {
    match node {
        ParseNode::FlagArg { name, value, .. } => (name, value.map(|v| node_value(*v))),
        other => (String::new(), Some(node_value(other))),
    }
}

/// Literal or identifier as a value; `true`, `false` and `null` are keywords.
fn node_value(node: ParseNode) -> Value {
    match node {
        ParseNode::Literal { value, .. } => value,
        ParseNode::Identifier { name, .. } => match name.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "null" => Value::Null,
            _ => Value::String(name),
        },
        other => Value::String(format!("{other:?}")),
    }
}

fn build_intent(
    name: String,
    span: Span,
    positional: Vec<ParseNode>,
    flag_nodes: Vec<ParseNode>,
    implicit_input: bool,
    registry: &CommandRegistry,
    directives: &mut FormatOptions,
) -> Result<CommandIntent, EngineError> {
    let mut flags = Map::new();
    for node in flag_nodes {
        let (flag, value) = flag_parts(node);
        if directives.set(&flag, value.as_ref().map(to_text)) {
            continue;
        }
        flags.insert(flag, value.unwrap_or(Value::Bool(true)));
    }

    let mut subcommand = None;
    let mut values = Vec::new();

    let name = if registry.contains(&name) {
        name
    } else if let Some((alias, action)) = name.split_once('.')
        && is_identifier(alias)
        && !action.is_empty()
        && registry.contains("invoke")
    {
        log::debug!("'{name}' -> invoke {alias} {action}");
        values.push(Value::from(alias));
        values.push(Value::from(action));
        "invoke".to_string()
    } else if is_identifier(&name)
        && positional.is_empty()
        && flags.is_empty()
        && registry.contains("var")
    {
        log::debug!("'{name}' -> var get {name}");
        subcommand = Some("get".to_string());
        values.push(Value::String(name));
        "var".to_string()
    } else {
        return Err(EngineError::UnknownCommand(name));
    };

    let mut positional = positional.into_iter().peekable();
    let takes_subcommand = registry
        .get(&name)
        .is_some_and(|handler| handler.takes_subcommand());
    if takes_subcommand
        && subcommand.is_none()
        && let Some(ParseNode::Identifier { name: sub, .. }) =
            positional.next_if(|n| matches!(n, ParseNode::Identifier { .. }))
    {
        subcommand = Some(sub);
    }
    values.extend(positional.map(node_value));

    Ok(CommandIntent {
        name,
        subcommand,
        positional: values,
        flags,
        implicit_input,
        span,
    })
}
