//! shoal REPL: interactive shell over the shoal evaluator.
//!
//! Handles:
//! - Meta-commands: `/help`, `/quit`, `/ast`, `/scope`, `/ports`, `/jobs`, `/tools`
//! - Evaluating lines through one long-lived `Evaluator`
//! - Command history via rustyline

use std::path::PathBuf;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tokio::runtime::Runtime;

use shoal_kernel::{parse, Evaluator, EvaluatorConfig};
use shoal_types::value_to_json;

/// Source name used for lines typed at the prompt.
pub const REPL_SOURCE_NAME: &str = "[repl]";

/// Sentinel error message that asks the read loop to exit.
const EXIT_SENTINEL: &str = "__REPL_EXIT__";

/// Result from meta-command handling.
#[derive(Debug)]
enum MetaResult {
    /// Continue with optional output
    Continue(Option<String>),
    /// Exit the REPL (caller should save history and exit)
    Exit,
}

/// REPL state: the evaluator, the runtime driving it, and display toggles.
pub struct Repl {
    evaluator: Evaluator,
    runtime: Runtime,
    show_ast: bool,
}

impl Repl {
    /// REPL on the host environment and standard streams.
    pub fn new() -> Result<Self> {
        Self::with_config(EvaluatorConfig::host())
    }

    pub fn with_config(config: EvaluatorConfig) -> Result<Self> {
        let runtime = Runtime::new().context("Failed to create tokio runtime")?;
        Ok(Self {
            evaluator: Evaluator::with_config(config),
            runtime,
            show_ast: false,
        })
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut Evaluator {
        &mut self.evaluator
    }

    /// Block until every background job has finished.
    pub fn wait_jobs(&self) {
        let jobs = self.runtime.block_on(self.evaluator.wait_jobs());
        tracing::debug!(jobs = jobs.len(), "background jobs finished");
    }

    /// Process a single line of input.
    ///
    /// Returns Ok(None) when there is nothing to show, Ok(Some(text)) for
    /// meta output and evaluation errors, and an Err carrying the exit
    /// sentinel when the user asked to quit.
    pub fn process_line(&mut self, line: &str) -> Result<Option<String>> {
        let trimmed = line.trim();

        if trimmed.starts_with('/') {
            return match self.handle_meta_command(trimmed) {
                MetaResult::Continue(output) => Ok(output),
                MetaResult::Exit => Err(anyhow::anyhow!(EXIT_SENTINEL)),
            };
        }

        if trimmed.is_empty() {
            return Ok(None);
        }

        if self.show_ast {
            return Ok(Some(match parse(REPL_SOURCE_NAME, trimmed) {
                Ok(chunk) => format!("{chunk:#?}"),
                Err(e) => format!("Parse error: {e}"),
            }));
        }

        let result = self
            .runtime
            .block_on(self.evaluator.eval_source(REPL_SOURCE_NAME, trimmed));
        match result {
            Ok(()) => Ok(None),
            Err(e) => Ok(Some(format!("Error: {e}"))),
        }
    }

    fn handle_meta_command(&mut self, cmd: &str) -> MetaResult {
        let command = cmd.split_whitespace().next().unwrap_or("");

        match command {
            "/quit" | "/q" | "/exit" => MetaResult::Exit,
            "/help" | "/h" | "/?" => MetaResult::Continue(Some(HELP_TEXT.to_string())),
            "/ast" => {
                self.show_ast = !self.show_ast;
                MetaResult::Continue(Some(format!(
                    "AST mode: {}",
                    if self.show_ast { "ON" } else { "OFF" }
                )))
            }
            "/scope" | "/vars" => MetaResult::Continue(Some(self.scope_json())),
            "/ports" => MetaResult::Continue(Some(self.port_listing())),
            "/jobs" => {
                let jobs = self.evaluator.jobs().list();
                if jobs.is_empty() {
                    MetaResult::Continue(Some("(no background jobs)".to_string()))
                } else {
                    let mut output = String::from("Background jobs:\n");
                    for job in jobs {
                        output.push_str(&format!("  [{}] {} {}\n", job.id, job.status, job.command));
                    }
                    MetaResult::Continue(Some(output.trim_end().to_string()))
                }
            }
            "/tools" => {
                let tools = self.evaluator.tools();
                MetaResult::Continue(Some(format!("Available tools: {}", tools.names().join(", "))))
            }
            _ => MetaResult::Continue(Some(format!(
                "Unknown command: {command}\nType /help for available commands."
            ))),
        }
    }

    /// Bound variables as a pretty-printed JSON object.
    fn scope_json(&self) -> String {
        let vars: serde_json::Map<String, serde_json::Value> = self
            .evaluator
            .scope()
            .snapshot()
            .into_iter()
            .map(|(name, value)| (name, value_to_json(&value)))
            .collect();
        serde_json::to_string_pretty(&vars).unwrap_or_else(|e| format!("(scope not printable: {e})"))
    }

    fn port_listing(&self) -> String {
        let mut out = String::from("Ports:");
        for index in 0..self.evaluator.port_count() {
            match self.evaluator.port(index) {
                Some(port) => out.push_str(&format!(
                    "\n  {index}: {}{}",
                    port.channel.describe(),
                    if port.owns_close { " (owned)" } else { "" }
                )),
                None => out.push_str(&format!("\n  {index}: (closed)")),
            }
        }
        out
    }
}

const HELP_TEXT: &str = r#"shoal REPL

Meta Commands:
  /help, /?         Show this help
  /quit, /q         Exit the REPL
  /ast              Toggle AST display mode (parse only, do not run)
  /scope, /vars     Show bound variables as JSON
  /ports            Show the port table
  /jobs             List background jobs
  /tools            List builtin tools

Language:
  cmd arg...        Run a builtin or an external program
  var x = value     Declare a variable
  set x = value     Assign an existing variable
  $x  $l[0]         Variable reference, indexing
  (cmd)             Output capture
  [a b c]           List
  a | b | c         Pipeline (port 1 of a feeds port 0 of b)
  cmd &             Run in background
  > >> < <> 2>&1 >&-  Redirections

A command that ends with a non-empty status prints "Status: ..." on stderr.
"#;

/// Save REPL history to disk.
fn save_history(rl: &mut Editor<(), DefaultHistory>, history_path: &Option<PathBuf>) {
    if let Some(path) = history_path {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create history directory: {}", e);
            }
        }
        if let Err(e) = rl.save_history(path) {
            tracing::warn!("Failed to save history: {}", e);
        }
    }
}

/// Run the interactive REPL.
pub fn run() -> Result<()> {
    println!("shoal v{}", env!("CARGO_PKG_VERSION"));
    println!("Type /help for commands, /quit to exit.");

    let mut rl: Editor<(), DefaultHistory> = Editor::new().context("Failed to create editor")?;

    let history_path =
        directories::BaseDirs::new().map(|b| b.data_dir().join("shoal").join("history.txt"));
    if let Some(ref path) = history_path {
        if let Err(e) = rl.load_history(path) {
            let is_not_found = matches!(&e, ReadlineError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound);
            if !is_not_found {
                tracing::warn!("Failed to load history: {}", e);
            }
        }
    }

    let mut repl = Repl::new()?;
    println!();

    loop {
        match rl.readline("shoal> ") {
            Ok(line) => {
                if let Err(e) = rl.add_history_entry(line.as_str()) {
                    tracing::warn!("Failed to add history entry: {}", e);
                }

                match repl.process_line(&line) {
                    Ok(Some(output)) => println!("{output}"),
                    Ok(None) => {}
                    Err(e) if e.to_string() == EXIT_SENTINEL => break,
                    Err(e) => eprintln!("Error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    save_history(&mut rl, &history_path);
    repl.wait_jobs();
    Ok(())
}
