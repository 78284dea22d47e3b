//! cx: interactive data-workflow shell.
//!
//! Usage:
//!   cx                     Start the interactive prompt
//!   cx -c "<line>"         Run one line and exit (non-zero on failure)
//!   cx --dump-config       Print the merged configuration as TOML

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use cx_shell::repl::{self, Interrupts, LinePrompter, LineSource};
use cx_shell::services::{Decline, Prompter};
use cx_shell::{Config, Engine, Services, logging};

#[derive(Parser)]
#[command(name = "cx", version, about = "Compose, pipe and persist data-workflow commands")]
struct Cli {
    /// Run one line non-interactively.
    #[arg(short = 'c', long = "command", value_name = "LINE")]
    command: Option<String>,

    /// Config overlay to merge instead of ~/.config/cx-shell/config.toml.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Saved session to load at start-up.
    #[arg(long, value_name = "NAME")]
    session: Option<String>,

    /// Print the merged configuration and exit.
    #[arg(long)]
    dump_config: bool,

    /// Answer yes to every confirmation.
    #[arg(short = 'y', long = "yes")]
    yes: bool,

    /// Debug logging on stderr.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref());
    if cli.yes {
        config.settings.assume_yes = true;
    }

    if cli.dump_config {
        match config.to_toml() {
            Ok(s) => print!("{s}"),
            Err(e) => {
                eprintln!("cx: failed to serialize config: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    logging::init(&config, cli.verbose);
    log::info!("cx {} starting", env!("CARGO_PKG_VERSION"));

    let history = config.settings.history.then(|| config.home_dir());
    let interrupts = Interrupts::listen();

    match cli.command {
        Some(line) => {
            // Nobody is at the terminal to answer.
            let services = Services::local(&config, Arc::new(Decline));
            let mut engine = Engine::new(config, services);
            if let Some(name) = &cli.session
                && !repl::run_line(&mut engine, &format!("session load {name}"), None, &interrupts)
                    .await
            {
                std::process::exit(1);
            }
            if !repl::run_line(&mut engine, &line, history.as_ref(), &interrupts).await {
                std::process::exit(1);
            }
        }
        None => {
            let lines = LineSource::stdin();
            let prompter: Arc<dyn Prompter> = Arc::new(LinePrompter::new(lines.clone()));
            let services = Services::local(&config, prompter);
            let mut engine = Engine::new(config, services);
            if let Some(name) = &cli.session {
                let load = format!("session load {name}");
                repl::run_line(&mut engine, &load, None, &interrupts).await;
            }
            repl::run(&mut engine, &lines, &interrupts).await;
        }
    }
}
