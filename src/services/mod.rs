//! External collaborators the engine calls through stable async contracts:
//! blueprint connectors, script execution, snapshot persistence and
//! interactive confirmation.
//!
//! The binary wires in the local implementations from this module; tests
//! substitute recording mocks.

pub mod assets;
pub mod process;
pub mod snapshot;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use assets::{Asset, AssetKind, Workspace};
pub use process::ProcessScriptRunner;
pub use snapshot::FileSnapshotStore;

use crate::config::Config;

/// Failure reported by a collaborator. Handlers wrap it into
/// [`EngineError::HandlerFailure`](crate::error::EngineError::HandlerFailure).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Unavailable(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Blueprint-backed capability provider.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Check that `source` can be reached before it is stored as a connection.
    async fn test_connection(&self, source: &str) -> Result<(), ServiceError>;

    async fn run_action(
        &self,
        source: &str,
        action: &str,
        params: Map<String, Value>,
    ) -> Result<Value, ServiceError>;

    async fn run_query(
        &self,
        source: &str,
        sql: &str,
        params: Map<String, Value>,
    ) -> Result<Value, ServiceError>;

    /// `variables` is the caller's session variables as a mapping.
    async fn run_flow(
        &self,
        path: &Path,
        params: Map<String, Value>,
        variables: Value,
    ) -> Result<Value, ServiceError>;
}

#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(
        &self,
        path: &Path,
        input: Option<Value>,
        params: Map<String, Value>,
    ) -> Result<Value, ServiceError>;
}

/// Persistence for [`Session::snapshot`](crate::session::Session::snapshot) documents.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, name: &str, doc: &Value) -> Result<(), ServiceError>;
    async fn load(&self, name: &str) -> Result<Value, ServiceError>;
    async fn list(&self) -> Result<Vec<String>, ServiceError>;
    async fn remove(&self, name: &str) -> Result<(), ServiceError>;
}

/// Interactive yes/no confirmation. Implementations must suspend, never
/// block the executor thread.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn confirm(&self, question: &str) -> bool;
}

/// Connector used when no blueprint runtime is attached to the shell.
pub struct DisconnectedConnector;

impl DisconnectedConnector {
    fn unavailable(what: &str) -> ServiceError {
        ServiceError::Unavailable(format!("cannot {what}: no blueprint runtime is attached"))
    }
}

#[async_trait]
impl Connector for DisconnectedConnector {
    async fn test_connection(&self, source: &str) -> Result<(), ServiceError> {
        Err(Self::unavailable(&format!("connect to {source}")))
    }

    async fn run_action(
        &self,
        _source: &str,
        action: &str,
        _params: Map<String, Value>,
    ) -> Result<Value, ServiceError> {
        Err(Self::unavailable(&format!("run action {action}")))
    }

    async fn run_query(
        &self,
        _source: &str,
        _sql: &str,
        _params: Map<String, Value>,
    ) -> Result<Value, ServiceError> {
        Err(Self::unavailable("run a query"))
    }

    async fn run_flow(
        &self,
        path: &Path,
        _params: Map<String, Value>,
        _variables: Value,
    ) -> Result<Value, ServiceError> {
        Err(Self::unavailable(&format!("run flow {}", path.display())))
    }
}

pub struct AssumeYes;

#[async_trait]
impl Prompter for AssumeYes {
    async fn confirm(&self, question: &str) -> bool {
        log::debug!("auto-confirmed: {question}");
        true
    }
}

/// Answers no to everything; used for non-interactive runs.
pub struct Decline;

#[async_trait]
impl Prompter for Decline {
    async fn confirm(&self, question: &str) -> bool {
        log::debug!("declined (non-interactive): {question}");
        false
    }
}

/// Everything a handler may call out to.
#[derive(Clone)]
pub struct Services {
    pub connector: Arc<dyn Connector>,
    pub scripts: Arc<dyn ScriptRunner>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub prompter: Arc<dyn Prompter>,
    pub workspace: Workspace,
}

impl Services {
    /// The local collaborators the binary ships with. `prompter` depends on
    /// whether the shell is interactive, so the caller supplies it.
    pub fn local(config: &Config, prompter: Arc<dyn Prompter>) -> Self {
        let home = config.home_dir();
        Self {
            connector: Arc::new(DisconnectedConnector),
            scripts: Arc::new(ProcessScriptRunner::new(
                config.scripts.interpreters.clone(),
            )),
            snapshots: Arc::new(FileSnapshotStore::new(home.join("sessions"))),
            prompter: if config.settings.assume_yes {
                Arc::new(AssumeYes)
            } else {
                prompter
            },
            workspace: Workspace::new(&home, &config.workspace_roots()),
        }
    }
}
