pub mod context;
pub mod executor;
pub mod resolve;

pub use context::ExecContext;

use std::collections::HashMap;
use std::future::Future;

use serde_json::Value;

use crate::ast::{self, CommandIntent};
use crate::commands::{Arguments, CommandHandler};
use crate::config::Config;
use crate::error::{EngineError, PipelineError};
use crate::format;
use crate::parse;
use crate::services::Services;
use crate::session::Session;

/// Registry of all command handlers, keyed by command name.
pub struct CommandRegistry {
    handlers: HashMap<String, Box<dyn CommandHandler>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Build the registry from configuration: every built-in handler except
    /// those listed in `commands.disabled`.
    pub fn from_config(config: &Config) -> Self {
        use crate::commands::{
            assets::AssetCommand,
            builtin::{Echo, Format, Help},
            connection::{Connect, Connections, Disconnect},
            inspect::Inspect,
            invoke::Invoke,
            session::SessionCommand,
            variable::Var,
            workspace::WorkspaceCommand,
        };
        use crate::services::AssetKind;

        let mut registry = Self::new();

        registry.register("connect", Connect);
        registry.register("connections", Connections);
        registry.register("disconnect", Disconnect);
        registry.register("var", Var);
        registry.register("inspect", Inspect);
        registry.register("session", SessionCommand);
        registry.register("flow", AssetCommand::new(AssetKind::Flow));
        registry.register("query", AssetCommand::new(AssetKind::Query));
        registry.register("script", AssetCommand::new(AssetKind::Script));
        registry.register("invoke", Invoke);
        registry.register("workspace", WorkspaceCommand);

        // Output-directive no-op and introspection
        registry.register("echo", Echo);
        registry.register("format", Format);
        registry.register("help", Help);

        for name in &config.commands.disabled {
            if registry.handlers.remove(name).is_some() {
                log::debug!("command '{name}' disabled by config");
            }
        }

        registry
    }

    /// Register `handler` under `name`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, handler: impl CommandHandler + 'static) {
        let name = name.into();
        if self.handlers.insert(name.clone(), Box::new(handler)).is_some() {
            log::debug!("command '{name}' re-registered");
        }
    }

    /// Look up a handler by exact command name.
    pub fn get(&self, name: &str) -> Option<&dyn CommandHandler> {
        self.handlers.get(name).map(|b| b.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Handlers sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn CommandHandler)> {
        let mut entries: Vec<(&str, &dyn CommandHandler)> = self
            .handlers
            .iter()
            .map(|(name, h)| (name.as_str(), h.as_ref()))
            .collect();
        entries.sort_by_key(|(name, _)| *name);
        entries.into_iter()
    }

    /// Resolve templates in `intent`'s arguments, validate them, then execute
    /// its handler with `input`.
    pub async fn dispatch(
        &self,
        intent: &CommandIntent,
        input: Option<Value>,
        ctx: &mut ExecContext<'_>,
    ) -> Result<Value, EngineError> {
        let handler = self
            .get(&intent.name)
            .ok_or_else(|| EngineError::UnknownCommand(intent.name.clone()))?;

        let session: &Session = ctx.session;
        let args = Arguments {
            command: intent.name.clone(),
            subcommand: intent.subcommand.clone(),
            positional: intent
                .positional
                .iter()
                .map(|v| resolve::resolve(v, session))
                .collect::<Result<_, _>>()?,
            flags: intent
                .flags
                .iter()
                .map(|(k, v)| Ok((k.clone(), resolve::resolve(v, session)?)))
                .collect::<Result<_, EngineError>>()?,
        };

        handler.validate(&args)?;
        if input.is_some() && !handler.accepts_input(&args) {
            return Err(EngineError::invalid_args(
                args.label(),
                "does not accept piped input",
            ));
        }

        let label = args.label();
        log::debug!("dispatch {label}");
        let result = handler.execute(args, input, ctx).await;
        match &result {
            Ok(_) => log::debug!("{label} done"),
            Err(e) => log::debug!("{label} failed: {e}"),
        }
        result
    }
}

/// What one line of input produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Blank or comment-only line.
    Empty,
    /// `name = ...`: the result was bound; nothing is rendered.
    Bound { name: String },
    /// The terminal result and its presentation. `warning` is set when the
    /// output directives failed and `text` is the raw value instead.
    Rendered {
        value: Value,
        text: String,
        warning: Option<String>,
    },
}

/// The Command Engine: parse, build, execute, then bind or render.
pub struct Engine {
    config: Config,
    registry: CommandRegistry,
    services: Services,
    session: Session,
}

impl Engine {
    pub fn new(config: Config, services: Services) -> Self {
        let registry = CommandRegistry::from_config(&config);
        Self::with_registry(config, services, registry)
    }

    pub fn with_registry(config: Config, services: Services, registry: CommandRegistry) -> Self {
        Self {
            config,
            registry,
            services,
            session: Session::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Execute one line. On any error the session is left exactly as it
    /// was before the line started.
    pub async fn execute(&mut self, line: &str) -> Result<Outcome, PipelineError> {
        self.execute_or_cancel(line, futures::future::pending()).await
    }

    /// Like [`execute`](Self::execute), but abandons the in-flight stage
    /// with [`EngineError::Interrupted`] as soon as `cancel` completes.
    pub async fn execute_or_cancel<F>(&mut self, line: &str, cancel: F) -> Result<Outcome, PipelineError>
    where
        F: Future<Output = ()>,
    {
        let checkpoint = self.session.clone();
        let result = tokio::select! {
            r = self.run_line(line) => r,
            () = cancel => Err(PipelineError::new(EngineError::Interrupted)),
        };
        if let Err(e) = &result {
            log::info!("pipeline failed: {e}");
            self.session = checkpoint;
        }
        result
    }

    async fn run_line(&mut self, line: &str) -> Result<Outcome, PipelineError> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(Outcome::Empty);
        }

        let tree = parse::parse(line)?;
        let program = ast::build(tree, &self.registry)?;

        let mut ctx = ExecContext::new(&mut self.session, &self.services, &self.registry);
        let mut stage_no = 0;
        let value =
            executor::run_pipeline(&program.pipeline, None, &mut ctx, &mut stage_no).await?;

        if let Some(name) = program.assign_to {
            self.session.set_variable(&name, value, trimmed);
            return Ok(Outcome::Bound { name });
        }

        match format::render(&value, &program.pipeline.format, &self.config.output) {
            Ok(text) => Ok(Outcome::Rendered {
                value,
                text,
                warning: None,
            }),
            Err(e) => {
                log::warn!("formatting failed, showing raw result: {e}");
                Ok(Outcome::Rendered {
                    text: format::render_raw(&value),
                    value,
                    warning: Some(PipelineError::new(e).to_string()),
                })
            }
        }
    }
}
