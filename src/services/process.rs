//! Script execution in a child process.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{ScriptRunner, ServiceError};

/// Runs a script with the interpreter configured for its extension (or
/// directly, when none is configured).
///
/// Protocol: implicit input is written to stdin as JSON; parameters are
/// passed as a single JSON object argument; stdout is parsed as JSON and
/// falls back to trimmed text.
pub struct ProcessScriptRunner {
    interpreters: BTreeMap<String, String>,
}

impl ProcessScriptRunner {
    pub fn new(interpreters: BTreeMap<String, String>) -> Self {
        Self { interpreters }
    }

    /// Program and leading arguments for `path`.
    fn command_line(&self, path: &Path) -> Result<Vec<String>, ServiceError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut argv = match self.interpreters.get(&ext) {
            Some(line) => shlex::split(line).ok_or_else(|| {
                ServiceError::Failed(format!("cannot parse interpreter for .{ext}: {line}"))
            })?,
            None => Vec::new(),
        };
        argv.push(path.to_string_lossy().into_owned());
        Ok(argv)
    }
}

#[async_trait]
impl ScriptRunner for ProcessScriptRunner {
    async fn run(
        &self,
        path: &Path,
        input: Option<Value>,
        params: Map<String, Value>,
    ) -> Result<Value, ServiceError> {
        let argv = self.command_line(path)?;
        let Some((program, args)) = argv.split_first() else {
            return Err(ServiceError::Failed("empty interpreter command".into()));
        };
        log::info!("spawn script: {}", argv.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .arg(Value::Object(params).to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = match &input {
                Some(v) => serde_json::to_vec(v)?,
                None => Vec::new(),
            };
            // The script may exit without reading stdin.
            if let Err(e) = stdin.write_all(&payload).await {
                log::debug!("script stdin closed early: {e}");
            }
            drop(stdin);
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServiceError::Failed(format!(
                "{} exited with {}: {}",
                path.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// JSON if it parses, otherwise the trimmed text (null when empty).
fn parse_output(stdout: &str) -> Value {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}
