//! Interactive loop.
//!
//! A reader task owns stdin and forwards lines into a channel. The prompt
//! loop and [`LinePrompter`] both await that channel, so a confirmation
//! asked in the middle of a pipeline suspends on the same input stream the
//! loop reads from instead of competing for it.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, Notify, mpsc};

use crate::error::PipelineError;
use crate::eval::{Engine, Outcome};
use crate::logging;
use crate::parse::needs_continuation;
use crate::services::Prompter;

const PROMPT: &str = "cx> ";
const CONTINUATION: &str = "... ";

/// Lines of operator input, shared by the loop and the prompter.
pub struct LineSource {
    rx: Mutex<mpsc::Receiver<String>>,
}

impl LineSource {
    /// Spawn the stdin reader task. Must be called inside a runtime.
    pub fn stdin() -> Arc<Self> {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("stdin read failed: {e}");
                        break;
                    }
                }
            }
        });
        Arc::new(Self { rx: Mutex::new(rx) })
    }

    /// A fixed script of lines, then EOF.
    pub fn from_lines<I, S>(lines: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        let (tx, rx) = mpsc::channel(lines.len().max(1));
        for line in lines {
            // Capacity covers every line.
            let _ = tx.try_send(line);
        }
        Arc::new(Self { rx: Mutex::new(rx) })
    }

    /// Next line, or `None` at end of input.
    pub async fn next(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }

    /// One complete statement: keeps reading while parentheses are open or
    /// a string is unterminated. `None` at end of input.
    pub async fn statement(&self) -> Option<String> {
        prompt(PROMPT);
        let mut text = self.next().await?;
        while needs_continuation(&text) {
            prompt(CONTINUATION);
            match self.next().await {
                Some(more) => {
                    text.push('\n');
                    text.push_str(&more);
                }
                // Hand the incomplete text to the parser so it reports where.
                None => break,
            }
        }
        Some(text)
    }
}

fn prompt(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}

/// Asks yes/no questions on the operator's terminal.
pub struct LinePrompter {
    lines: Arc<LineSource>,
}

impl LinePrompter {
    pub fn new(lines: Arc<LineSource>) -> Self {
        Self { lines }
    }
}

#[async_trait]
impl Prompter for LinePrompter {
    async fn confirm(&self, question: &str) -> bool {
        prompt(&format!("{question} [y/N] "));
        match self.lines.next().await {
            Some(answer) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            None => false,
        }
    }
}

/// Operator interrupts (Ctrl-C), broadcast to whoever is waiting.
#[derive(Clone, Default)]
pub struct Interrupts {
    notify: Arc<Notify>,
}

impl Interrupts {
    /// Spawn the SIGINT listener. Must be called inside a runtime.
    pub fn listen() -> Self {
        let interrupts = Self::default();
        let notify = interrupts.notify.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                log::debug!("interrupt");
                notify.notify_waiters();
            }
            log::warn!("Ctrl-C handler unavailable; pipelines cannot be interrupted");
        });
        interrupts
    }

    /// Wake everything currently awaiting [`next`](Self::next).
    pub fn raise(&self) {
        self.notify.notify_waiters();
    }

    /// Resolves at the next interrupt. Interrupts raised while nobody waits
    /// are dropped.
    pub async fn next(&self) {
        self.notify.notified().await;
    }
}

/// Run one line, print its outcome, and record it in the history log.
/// Returns whether the line succeeded.
pub async fn run_line(
    engine: &mut Engine,
    line: &str,
    history: Option<&PathBuf>,
    interrupts: &Interrupts,
) -> bool {
    let result = engine.execute_or_cancel(line, interrupts.next()).await;
    report(&result);

    if let Some(home) = history
        && !matches!(result, Ok(Outcome::Empty))
    {
        let (outcome, detail) = match &result {
            Ok(Outcome::Bound { name }) => ("bound", name.clone()),
            Ok(Outcome::Rendered { warning: Some(w), .. }) => ("warning", w.clone()),
            Ok(_) => ("ok", String::new()),
            Err(e) => (e.kind(), e.to_string()),
        };
        logging::log_pipeline(home, line, outcome, &detail);
    }
    result.is_ok()
}

fn report(result: &Result<Outcome, PipelineError>) {
    match result {
        Ok(Outcome::Empty) => {}
        Ok(Outcome::Bound { name }) => log::debug!("bound '{name}'"),
        Ok(Outcome::Rendered { text, warning, .. }) => {
            if let Some(w) = warning {
                eprintln!("warning: {w}");
            }
            println!("{text}");
        }
        Err(e) => eprintln!("error: {e}"),
    }
}

/// The prompt loop. Returns at `exit`, `quit` or end of input.
pub async fn run(engine: &mut Engine, lines: &LineSource, interrupts: &Interrupts) {
    let history = engine
        .config()
        .settings
        .history
        .then(|| engine.config().home_dir());

    loop {
        let statement = tokio::select! {
            statement = lines.statement() => statement,
            () = interrupts.next() => {
                println!();
                continue;
            }
        };
        let Some(line) = statement else { break };
        if matches!(line.trim(), "exit" | "quit") {
            break;
        }
        run_line(engine, &line, history.as_ref(), interrupts).await;
    }
    println!();
}
