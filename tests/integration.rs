use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tempfile::TempDir;
use tokio::sync::Notify;

use cx_shell::services::{
    AssumeYes, Connector, FileSnapshotStore, ScriptRunner, ServiceError, Workspace,
};
use cx_shell::{Config, Engine, EngineError, Outcome, PipelineError, Services};

/// Shared record of every collaborator call, in order.
type CallLog = Arc<Mutex<Vec<String>>>;

fn pets() -> Value {
    json!([
        {"id": 1, "name": "rex", "status": "available"},
        {"id": 2, "name": "tom", "status": "sold"},
        {"id": 3, "name": "kit", "status": "available"},
    ])
}

struct PetstoreConnector {
    calls: CallLog,
    /// Signalled when the `slow` action starts; `slow` never finishes.
    started: Arc<Notify>,
}

#[async_trait]
impl Connector for PetstoreConnector {
    async fn test_connection(&self, _source: &str) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn run_action(
        &self,
        _source: &str,
        action: &str,
        params: Map<String, Value>,
    ) -> Result<Value, ServiceError> {
        self.calls.lock().unwrap().push(action.to_string());
        match action {
            "listPets" => {
                let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(100) as usize;
                let all = pets();
                Ok(Value::Array(all.as_array().unwrap().iter().take(limit).cloned().collect()))
            }
            "getPetById" => {
                let id = params.get("value").and_then(Value::as_u64).unwrap_or(0);
                pets()
                    .as_array()
                    .unwrap()
                    .iter()
                    .find(|p| p["id"] == id)
                    .cloned()
                    .ok_or_else(|| ServiceError::NotFound(format!("pet {id}")))
            }
            "slow" => {
                self.started.notify_one();
                futures::future::pending().await
            }
            other => Err(ServiceError::Failed(format!("unknown action {other}"))),
        }
    }

    async fn run_query(
        &self,
        _source: &str,
        _sql: &str,
        _params: Map<String, Value>,
    ) -> Result<Value, ServiceError> {
        Ok(json!([]))
    }

    async fn run_flow(
        &self,
        _path: &Path,
        _params: Map<String, Value>,
        _variables: Value,
    ) -> Result<Value, ServiceError> {
        Ok(Value::Null)
    }
}

/// `filter.py` keeps available pets; `tag.py` adds a `tagged` field.
struct FakeScripts {
    calls: CallLog,
}

#[async_trait]
impl ScriptRunner for FakeScripts {
    async fn run(
        &self,
        path: &Path,
        input: Option<Value>,
        _params: Map<String, Value>,
    ) -> Result<Value, ServiceError> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        self.calls.lock().unwrap().push(name.clone());
        let items = input.unwrap_or(Value::Null).as_array().cloned().unwrap_or_default();
        match name.as_str() {
            "filter.py" => Ok(items
                .into_iter()
                .filter(|p| p["status"] == "available")
                .collect()),
            "tag.py" => Ok(items
                .into_iter()
                .map(|mut p| {
                    p["tagged"] = json!(true);
                    p
                })
                .collect()),
            _ => Err(ServiceError::Failed(format!("{name} exited with status 1"))),
        }
    }
}

struct Shell {
    engine: Engine,
    calls: CallLog,
    started: Arc<Notify>,
    _home: TempDir,
}

impl Shell {
    fn new() -> Self {
        let home = tempfile::tempdir().unwrap();
        for script in ["filter.py", "tag.py", "broken.py"] {
            let path = home.path().join("scripts").join(script);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "").unwrap();
        }

        let mut config = Config::default_config();
        config.paths.home = home.path().display().to_string();
        config.settings.history = false;

        let calls: CallLog = Arc::default();
        let started = Arc::new(Notify::new());
        let services = Services {
            connector: Arc::new(PetstoreConnector {
                calls: calls.clone(),
                started: started.clone(),
            }),
            scripts: Arc::new(FakeScripts {
                calls: calls.clone(),
            }),
            snapshots: Arc::new(FileSnapshotStore::new(home.path().join("sessions"))),
            prompter: Arc::new(AssumeYes),
            workspace: Workspace::new(home.path(), &[]),
        };

        Self {
            engine: Engine::new(config, services),
            calls,
            started,
            _home: home,
        }
    }

    async fn connected() -> Self {
        let mut shell = Self::new();
        shell.ok("connect user:petstore --as api").await;
        shell
    }

    async fn ok(&mut self, line: &str) -> Outcome {
        match self.engine.execute(line).await {
            Ok(outcome) => outcome,
            Err(e) => panic!("'{line}' failed: {e}"),
        }
    }

    async fn value(&mut self, line: &str) -> Value {
        match self.ok(line).await {
            Outcome::Rendered { value, .. } => value,
            other => panic!("'{line}' rendered nothing: {other:?}"),
        }
    }

    async fn text(&mut self, line: &str) -> String {
        match self.ok(line).await {
            Outcome::Rendered { text, .. } => text,
            other => panic!("'{line}' rendered nothing: {other:?}"),
        }
    }

    async fn err(&mut self, line: &str) -> PipelineError {
        match self.engine.execute(line).await {
            Ok(outcome) => panic!("'{line}' should fail, got {outcome:?}"),
            Err(e) => e,
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

// ── Syntax errors never touch the session ──

macro_rules! syntax_error_test {
    ($name:ident, $line:expr) => {
        #[tokio::test]
        async fn $name() {
            let mut shell = Shell::new();
            shell.ok("keep = echo 1").await;
            let before = shell.engine.session().clone();
            let err = shell.err($line).await;
            assert_eq!(err.kind(), "SyntaxError", "line: {}", $line);
            assert_eq!(err.stage, None);
            assert_eq!(shell.engine.session(), &before);
        }
    };
}

syntax_error_test!(syntax_unclosed_call_args, "api.getPetById(");
syntax_error_test!(syntax_unclosed_group, "(echo 1 | format");
syntax_error_test!(syntax_dangling_pipe, "echo 1 |");
syntax_error_test!(syntax_leading_pipe, "| echo 1");
syntax_error_test!(syntax_dotted_target, "a.b = echo 1");
syntax_error_test!(syntax_missing_rhs, "x =");
syntax_error_test!(syntax_word_after_group, "(echo 1) echo");
syntax_error_test!(syntax_unterminated_string, "echo \"open");
syntax_error_test!(syntax_bad_flag, "echo 1 --9");

#[tokio::test]
async fn syntax_error_reports_column_and_hint() {
    let mut shell = Shell::new();
    let err = shell.err("api.getPetById(").await;
    let EngineError::Syntax {
        message,
        position,
        expected,
    } = err.error
    else {
        panic!("expected a syntax error");
    };
    assert_eq!(message, "unexpected end of input");
    assert_eq!(position, 15);
    assert!(expected.unwrap().contains("')'"));
}

// ── Pipelines and binding ──

#[tokio::test]
async fn bind_piped_result_then_list_and_inspect() {
    let mut shell = Shell::connected().await;
    let outcome = shell
        .ok("pets = api.listPets(limit=2) | script run \"filter.py\"")
        .await;
    assert_eq!(outcome, Outcome::Bound { name: "pets".into() });
    assert_eq!(shell.calls(), vec!["listPets", "filter.py"]);

    let vars = shell.value("var list").await;
    assert_eq!(vars[0]["name"], "pets");
    assert_eq!(vars[0]["type"], "sequence");

    let summary = shell.value("inspect pets").await;
    assert_eq!(summary["type"], "sequence");
    assert_eq!(summary["length"], 1);
    assert_eq!(summary["item_zero_keys"], json!(["id", "name", "status"]));
}

#[tokio::test]
async fn single_record_renders_as_one_row_table() {
    let mut shell = Shell::connected().await;
    let text = shell
        .text("api.getPetById(1) --output table --columns name,status")
        .await;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[1], "│ name │ status    │");
    assert_eq!(lines[3], "│ rex  │ available │");
}

#[tokio::test]
async fn failing_stage_aborts_without_binding() {
    let mut shell = Shell::connected().await;
    let err = shell
        .err("x = api.listPets | script run broken.py | script run tag.py")
        .await;
    assert_eq!(err.kind(), "HandlerFailure");
    assert_eq!(err.stage, Some(2));
    assert_eq!(err.command.as_deref(), Some("script run"));
    assert!(shell.engine.session().variable("x").is_none());
    // Nothing after the failing stage ran.
    assert_eq!(shell.calls(), vec!["listPets", "broken.py"]);
}

#[tokio::test]
async fn grouped_pipeline_runs_before_outer_stage() {
    let mut shell = Shell::connected().await;
    let value = shell
        .value("(api.listPets | script run filter.py) | script run tag.py")
        .await;
    assert_eq!(shell.calls(), vec!["listPets", "filter.py", "tag.py"]);
    assert_eq!(value.as_array().unwrap().len(), 2);
    assert!(value.as_array().unwrap().iter().all(|p| p["tagged"] == true));
}

#[tokio::test]
async fn each_stage_dispatches_once() {
    let mut shell = Shell::connected().await;
    shell.ok("a = api.listPets(limit=1)").await;
    shell.ok("b = api.listPets(limit=1) | script run tag.py").await;
    assert_eq!(shell.calls(), vec!["listPets", "listPets", "tag.py"]);
}

#[tokio::test]
async fn templates_preserve_native_types() {
    let mut shell = Shell::connected().await;
    shell.ok("n = echo 42").await;
    shell.ok("pets = api.listPets(limit=2)").await;

    assert_eq!(shell.value("echo {{n}}").await, json!(42));
    assert_eq!(shell.value("echo {{pets[1].name}}").await, json!("tom"));
    assert_eq!(shell.value("echo \"n={{n}}\"").await, json!("n=42"));
    shell.ok("id = echo 3").await;
    assert_eq!(shell.value("api.getPetById({{id}})").await["name"], "kit");
}

#[tokio::test]
async fn spaced_templates_work_unquoted() {
    let mut shell = Shell::connected().await;
    shell.ok("n = echo 42").await;
    shell.ok("id = echo 3").await;

    assert_eq!(shell.value("echo {{ n }}").await, json!(42));
    assert_eq!(shell.value("api.getPetById({{ id }})").await["name"], "kit");
    assert_eq!(shell.value("echo n-{{ n }}").await, json!("n-42"));
}

#[tokio::test]
async fn undefined_template_variable_fails_the_stage() {
    let mut shell = Shell::new();
    let err = shell.err("echo {{ghost}}").await;
    assert_eq!(err.kind(), "UndefinedVariable");
    assert_eq!(err.stage, Some(1));
}

#[tokio::test]
async fn bare_identifier_reads_variable() {
    let mut shell = Shell::new();
    shell.ok("greeting = echo hello").await;
    assert_eq!(shell.value("greeting").await, json!("hello"));
    assert_eq!(shell.err("nothing_here").await.kind(), "UndefinedVariable");
}

#[tokio::test]
async fn unknown_command_is_reported_before_anything_runs() {
    let mut shell = Shell::connected().await;
    let err = shell.err("api.listPets | frobnicate now").await;
    assert_eq!(err.kind(), "UnknownCommand");
    assert!(shell.calls().is_empty());
}

// ── Output directives ──

#[tokio::test]
async fn query_directive_applies_jq() {
    let mut shell = Shell::connected().await;
    let text = shell
        .text("api.listPets --query '[.[] | .name]' --output raw")
        .await;
    assert_eq!(text, r#"["rex","tom","kit"]"#);
}

#[tokio::test]
async fn query_directive_uses_core_filters() {
    let mut shell = Shell::connected().await;
    match shell.ok("echo 1 --query '. + 1' --output raw").await {
        Outcome::Rendered { text, warning, .. } => {
            assert_eq!(text, "2");
            assert_eq!(warning, None);
        }
        other => panic!("unexpected {other:?}"),
    }
    let text = shell
        .text("api.listPets --query 'map(select(.name != \"tom\")) | length' --output raw")
        .await;
    assert_eq!(text, "2");
}

#[tokio::test]
async fn format_stage_carries_directives() {
    let mut shell = Shell::connected().await;
    shell.ok("pets = api.listPets(limit=1)").await;
    let text = shell.text("pets | format --output json").await;
    assert!(text.starts_with("[\n"));
}

#[tokio::test]
async fn bad_columns_fall_back_to_raw_with_warning() {
    let mut shell = Shell::connected().await;
    match shell.ok("api.listPets --output json --columns name").await {
        Outcome::Rendered { warning, text, .. } => {
            assert!(warning.unwrap().starts_with("Formatting"));
            assert!(text.contains("\"rex\""));
        }
        other => panic!("unexpected {other:?}"),
    }
}

// ── Sessions ──

#[tokio::test]
async fn snapshot_round_trip_through_files() {
    let mut shell = Shell::connected().await;
    shell.ok("pets = api.listPets(limit=2)").await;
    shell.ok("session save work").await;
    shell.ok("var clear").await;
    shell.ok("disconnect api").await;

    shell.ok("session load work").await;
    assert_eq!(
        shell.value("pets").await,
        Value::from(pets().as_array().unwrap()[..2].to_vec())
    );
    let status = shell.value("session status").await;
    assert_eq!(status["active"], "api");
}

#[tokio::test]
async fn cancellation_restores_session() {
    let mut shell = Shell::connected().await;
    shell.ok("n = echo 1").await;
    let before = shell.engine.session().clone();

    let started = shell.started.clone();
    let result = shell
        .engine
        .execute_or_cancel("connect user:other --as db | api.slow", async move {
            started.notified().await;
        })
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.error, EngineError::Interrupted);
    assert_eq!(shell.engine.session(), &before);
    assert_eq!(shell.engine.session().active_connection().unwrap().alias, "api");
}

#[tokio::test]
async fn workspace_add_makes_scripts_runnable() {
    let mut shell = Shell::new();
    let project = tempfile::tempdir().unwrap();
    let script = project.path().join("scripts").join("tag.py");
    std::fs::create_dir_all(script.parent().unwrap()).unwrap();
    std::fs::write(&script, "").unwrap();

    // The home root already has a tag.py; it wins for bare names.
    let ns = project.path().file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(shell.err(&format!("script run {ns}/tag.py")).await.kind(), "HandlerFailure");

    shell
        .ok(&format!("workspace add \"{}\"", project.path().display()))
        .await;
    let roots = shell.value("workspace list").await;
    assert_eq!(roots.as_array().unwrap().len(), 2);
    shell.ok(&format!("script run {ns}/tag.py")).await;
    assert_eq!(shell.calls(), vec!["tag.py"]);
}

#[tokio::test]
async fn blank_and_comment_lines_do_nothing() {
    let mut shell = Shell::new();
    assert_eq!(shell.ok("   ").await, Outcome::Empty);
    assert_eq!(shell.ok("# just a note").await, Outcome::Empty);
}
