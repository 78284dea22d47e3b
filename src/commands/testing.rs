//! Handler test harness: a session plus recording collaborators.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tempfile::TempDir;

use crate::commands::{Arguments, CommandHandler};
use crate::config::Config;
use crate::error::EngineError;
use crate::eval::{CommandRegistry, ExecContext};
use crate::services::{
    AssumeYes, Connector, Prompter, ScriptRunner, ServiceError, Services, SnapshotStore, Workspace,
};
use crate::session::Session;

/// Echoes every call back as a mapping and records it as `kind:target`.
#[derive(Default)]
pub struct RecordingConnector {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingConnector {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn test_connection(&self, source: &str) -> Result<(), ServiceError> {
        self.record(format!("test:{source}"));
        if source.starts_with("bad:") {
            return Err(ServiceError::Unavailable(format!("{source} is unreachable")));
        }
        Ok(())
    }

    async fn run_action(
        &self,
        source: &str,
        action: &str,
        params: Map<String, Value>,
    ) -> Result<Value, ServiceError> {
        self.record(format!("action:{action}"));
        Ok(json!({"source": source, "action": action, "params": params}))
    }

    async fn run_query(
        &self,
        source: &str,
        sql: &str,
        params: Map<String, Value>,
    ) -> Result<Value, ServiceError> {
        self.record(format!("query:{source}"));
        Ok(json!({"source": source, "sql": sql, "params": params}))
    }

    async fn run_flow(
        &self,
        path: &Path,
        params: Map<String, Value>,
        variables: Value,
    ) -> Result<Value, ServiceError> {
        self.record(format!("flow:{}", path.display()));
        Ok(json!({"params": params, "variables": variables}))
    }
}

/// Returns what it was given instead of spawning anything.
pub struct EchoScripts;

#[async_trait]
impl ScriptRunner for EchoScripts {
    async fn run(
        &self,
        path: &Path,
        input: Option<Value>,
        params: Map<String, Value>,
    ) -> Result<Value, ServiceError> {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        Ok(json!({"script": name, "input": input, "params": params}))
    }
}

#[derive(Default)]
pub struct MemorySnapshots {
    docs: Mutex<BTreeMap<String, Value>>,
}

#[async_trait]
impl SnapshotStore for MemorySnapshots {
    async fn save(&self, name: &str, doc: &Value) -> Result<(), ServiceError> {
        self.docs.lock().unwrap().insert(name.to_string(), doc.clone());
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Value, ServiceError> {
        self.docs
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("session '{name}'")))
    }

    async fn list(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.docs.lock().unwrap().keys().cloned().collect())
    }

    async fn remove(&self, name: &str) -> Result<(), ServiceError> {
        match self.docs.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound(format!("session '{name}'"))),
        }
    }
}

pub struct Harness {
    pub session: Session,
    pub services: Services,
    pub registry: CommandRegistry,
    pub connector: Arc<RecordingConnector>,
    /// Workspace home; `flows/`, `queries/` and `scripts/` go under it.
    pub home: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_prompter(Arc::new(AssumeYes))
    }

    pub fn with_prompter(prompter: Arc<dyn Prompter>) -> Self {
        let home = tempfile::tempdir().unwrap();
        let connector = Arc::new(RecordingConnector::default());
        let services = Services {
            connector: connector.clone(),
            scripts: Arc::new(EchoScripts),
            snapshots: Arc::new(MemorySnapshots::default()),
            prompter,
            workspace: Workspace::new(home.path(), &[]),
        };
        Self {
            session: Session::new(),
            services,
            registry: CommandRegistry::from_config(&Config::default_config()),
            connector,
            home,
        }
    }

    /// Write `body` to `rel` under the workspace home.
    pub fn asset(&self, rel: &str, body: &str) {
        let path = self.home.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    pub fn calls(&self) -> Vec<String> {
        self.connector.calls.lock().unwrap().clone()
    }

    /// Validate and execute `handler`. An empty `sub` means no subcommand.
    pub async fn run(
        &mut self,
        handler: &dyn CommandHandler,
        sub: &str,
        positional: &[Value],
        input: Option<Value>,
    ) -> Result<Value, EngineError> {
        self.run_with(handler, sub, positional, &[], input).await
    }

    pub async fn run_with(
        &mut self,
        handler: &dyn CommandHandler,
        sub: &str,
        positional: &[Value],
        flags: &[(&str, Value)],
        input: Option<Value>,
    ) -> Result<Value, EngineError> {
        let command = handler.usage().split_whitespace().next().unwrap_or_default();
        let args = Arguments {
            command: command.to_string(),
            subcommand: (!sub.is_empty()).then(|| sub.to_string()),
            positional: positional.to_vec(),
            flags: flags.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        };
        handler.validate(&args)?;
        let mut ctx = ExecContext::new(&mut self.session, &self.services, &self.registry);
        handler.execute(args, input, &mut ctx).await
    }
}
