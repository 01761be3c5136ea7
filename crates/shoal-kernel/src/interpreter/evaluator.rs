//! The evaluator: per-evaluation state and the single recovery boundary.
//!
//! An `Evaluator` holds the port table, the diagnostic stack and the name
//! and text of the source being run. Pipeline stages, captures and
//! background jobs each run in a copy made with [`Evaluator::copy`]; copies
//! share the scope, environment and compiler but get their own port table
//! and an empty diagnostic stack.

use std::collections::HashMap;
use std::io;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

use shoal_types::{Env, Type, Value};

use crate::ast::{Chunk, NodeMark, Pos, MAX_PORTS};
use crate::compiler::{Compiler, OpRef};
use crate::config::{EnvSource, EvaluatorConfig};
use crate::diag::ContextualError;
use crate::parser::parse;
use crate::scheduler::{JobId, JobManager};
use crate::tools::{register_builtins, ToolRegistry};

use super::error::{EvalError, EvalResult};
use super::port::{Channel, Port};
use super::scope::Scope;
use super::status::{default_status_callback, status_ok, StatusCallback};

pub struct Evaluator {
    compiler: Arc<Compiler>,
    name: String,
    text: Arc<str>,
    scope: Scope,
    env: Arc<Env>,
    search_paths: Arc<[PathBuf]>,
    ports: Vec<Option<Port>>,
    status_cb: StatusCallback,
    nodes: Vec<NodeMark>,
    pipe_buffer_size: usize,
    jobs: Arc<JobManager>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Root evaluator wired to the host: host environment, host standard
    /// streams, statuses on stderr.
    pub fn new() -> Self {
        Self::with_config(EvaluatorConfig::default())
    }

    pub fn with_config(config: EvaluatorConfig) -> Self {
        let env = match config.env_source {
            EnvSource::Host => {
                let mut env = Env::new();
                env.fill();
                env
            }
            EnvSource::Fixed(pairs) => Env::from_pairs(pairs),
        };
        let env = Arc::new(env);
        let search_paths: Arc<[PathBuf]> = env.search_paths(&config.default_search_path).into();

        let scope = Scope::new();
        scope.declare("env", Value::Env(env.clone()));
        scope.declare("pid", Value::string(std::process::id().to_string()));

        let mut tools = ToolRegistry::new();
        register_builtins(&mut tools);

        tracing::debug!(
            env_vars = env.len(),
            search_paths = search_paths.len(),
            tools = tools.len(),
            "evaluator created"
        );

        Self {
            compiler: Arc::new(Compiler::new(Arc::new(tools))),
            name: String::new(),
            text: Arc::from(""),
            scope,
            env,
            search_paths,
            ports: vec![
                Some(Port::borrowed(Channel::Stdin)),
                Some(Port::borrowed(Channel::Stdout)),
                Some(Port::borrowed(Channel::Stderr)),
            ],
            status_cb: config.status_callback.unwrap_or_else(default_status_callback),
            nodes: Vec::new(),
            pipe_buffer_size: config.pipe_buffer_size,
            jobs: Arc::new(JobManager::new()),
        }
    }

    /// Fork an evaluator for a concurrent stage.
    ///
    /// The copy shares scope, environment and compiler, and gets a fresh
    /// port table pointing at the same channels. Close responsibility ends
    /// up on exactly one side: with `move_ownership` the copy takes it and
    /// the parent's flags are cleared; without it the copy's flags are
    /// cleared. Either way it is the whole table, not only what the copy
    /// will touch.
    pub fn copy(&mut self, name: impl Into<String>, move_ownership: bool) -> Evaluator {
        let name = name.into();
        let mut ports = self.ports.clone();
        let cleared = if move_ownership {
            &mut self.ports
        } else {
            &mut ports
        };
        for port in cleared.iter_mut().flatten() {
            port.owns_close = false;
        }
        tracing::debug!(parent = %self.name, child = %name, move_ownership, ports = ports.len(), "evaluator copied");

        Evaluator {
            compiler: self.compiler.clone(),
            name,
            text: self.text.clone(),
            scope: self.scope.clone(),
            env: self.env.clone(),
            search_paths: self.search_paths.clone(),
            ports,
            status_cb: self.status_cb.clone(),
            nodes: Vec::new(),
            pipe_buffer_size: self.pipe_buffer_size,
            jobs: self.jobs.clone(),
        }
    }

    // --- ports ---

    pub fn port(&self, index: usize) -> Option<&Port> {
        self.ports.get(index).and_then(Option::as_ref)
    }

    pub fn port_mut(&mut self, index: usize) -> Option<&mut Port> {
        self.ports.get_mut(index).and_then(Option::as_mut)
    }

    /// Clone of the channel on port `index`, if the port is open.
    pub fn channel(&self, index: usize) -> Option<Channel> {
        self.port(index).map(|p| p.channel.clone())
    }

    /// Number of slots in the port table, open or not.
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Make sure the table has at least `n` slots, up to [`MAX_PORTS`].
    /// Never shrinks.
    pub fn grow_ports(&mut self, n: usize) {
        let n = n.min(MAX_PORTS);
        if self.ports.len() < n {
            self.ports.resize(n, None);
        }
    }

    /// Install `port` at `index`, growing the table as needed. The previous
    /// port is returned unclosed.
    pub fn set_port(&mut self, index: usize, port: Port) -> EvalResult<Option<Port>> {
        let Some(len) = index.checked_add(1).filter(|&n| n <= MAX_PORTS) else {
            return Err(self.error(format!(
                "port {index} out of range (max {})",
                MAX_PORTS - 1
            )));
        };
        self.grow_ports(len);
        Ok(self.ports[index].replace(port))
    }

    /// Install `port` at `index`, closing whatever was there if it was owned.
    pub async fn replace_port(&mut self, index: usize, port: Port) -> EvalResult<()> {
        if let Some(mut old) = self.set_port(index, port)? {
            old.close().await;
        }
        Ok(())
    }

    /// Close port `index` if owned and empty its slot.
    pub async fn remove_port(&mut self, index: usize) {
        if let Some(mut old) = self.ports.get_mut(index).and_then(Option::take) {
            old.close().await;
        }
    }

    /// Close port `index` if this evaluator owns it. The slot stays.
    pub async fn close_port(&mut self, index: usize) -> bool {
        match self.port_mut(index) {
            Some(port) => port.close().await,
            None => false,
        }
    }

    /// Close every port this evaluator owns.
    pub async fn close_ports(&mut self) {
        for port in self.ports.iter_mut().flatten() {
            port.close().await;
        }
    }

    /// Write to port `index`.
    ///
    /// A reader that has gone away is not an error: the bytes are dropped,
    /// as a writer at the head of a pipeline would be stopped by SIGPIPE.
    pub async fn write_port(&self, index: usize, data: &[u8]) -> EvalResult<()> {
        let Some(channel) = self.channel(index) else {
            return Err(self.error(format!("port {index} is not open")));
        };
        match channel.write_all(data).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                tracing::trace!(port = index, "write to closed reader dropped");
                Ok(())
            }
            Err(e) => Err(self.error(format!("write to port {index}: {e}"))),
        }
    }

    /// Read port `index` until end of input.
    pub async fn read_port_to_end(&self, index: usize) -> EvalResult<Vec<u8>> {
        let Some(channel) = self.channel(index) else {
            return Err(self.error(format!("port {index} is not open")));
        };
        channel
            .read_to_end()
            .await
            .map_err(|e| self.error(format!("read from port {index}: {e}")))
    }

    // --- evaluation ---

    /// Static types of the current scope, for the compiler.
    pub fn compiler_scope(&self) -> HashMap<String, Type> {
        self.scope.types()
    }

    /// Compile and run a parsed chunk.
    ///
    /// `name` and `text` are in force for the duration of the call and
    /// cleared afterwards, whether it succeeds, fails or is cancelled.
    /// Errors raised anywhere inside come back as the `Err` value; none
    /// escape any other way.
    #[tracing::instrument(level = "info", skip(self, text, chunk), fields(text_len = text.len()))]
    pub async fn eval(&mut self, name: &str, text: &str, chunk: &Chunk) -> EvalResult<()> {
        let scope_types = self.compiler_scope();
        let op = self.compiler.compile(name, text, chunk, &scope_types)?;
        let Some(op) = op else {
            tracing::debug!("empty chunk");
            return Ok(());
        };
        self.run_op(name, Arc::from(text), op).await
    }

    /// Parse `text` and evaluate it.
    pub async fn eval_source(&mut self, name: &str, text: &str) -> EvalResult<()> {
        let chunk = parse(name, text).map_err(EvalError::Parse)?;
        self.eval(name, text, &chunk).await
    }

    async fn run_op(&mut self, name: &str, text: Arc<str>, op: OpRef) -> EvalResult<()> {
        let mut ev = SourceGuard::enter(self, name, text);
        let result = op.exec(&mut ev).await;
        if let Err(e) = &result {
            tracing::debug!(error = %e, "evaluation failed");
        }
        result.map(|_| ())
    }

    // --- diagnostics ---

    pub(crate) fn push(&mut self, mark: NodeMark) {
        tracing::trace!(kind = mark.kind, pos = mark.pos, depth = self.nodes.len(), "enter node");
        self.nodes.push(mark);
    }

    pub(crate) fn pop(&mut self) {
        self.nodes.pop();
    }

    /// Innermost node currently executing, if any.
    pub fn current_node(&self) -> Option<NodeMark> {
        self.nodes.last().copied()
    }

    pub fn diagnostic_depth(&self) -> usize {
        self.nodes.len()
    }

    /// Build an error attributed to the innermost executing node, or a
    /// plain error when nothing is executing.
    pub fn error(&self, message: impl Into<String>) -> EvalError {
        match self.current_node() {
            Some(mark) => self.error_at(mark.pos, message),
            None => EvalError::Plain(message.into()),
        }
    }

    /// Build an error attributed to `pos` in the current source.
    pub fn error_at(&self, pos: Pos, message: impl Into<String>) -> EvalError {
        EvalError::Runtime(ContextualError::new(
            self.name.clone(),
            self.text.clone(),
            pos,
            message,
        ))
    }

    /// Require exactly one string among `values`; attribute failure to `at`.
    pub fn as_single_string(&self, at: NodeMark, values: Vec<Value>, what: &str) -> EvalResult<String> {
        let count = values.len();
        let mut values = values.into_iter();
        match (values.next(), values.next()) {
            (Some(Value::String(s)), None) => Ok(s),
            (Some(other), None) => Err(self.error_at(
                at.pos,
                format!("Expect string for {what}, got {}", other.repr()),
            )),
            _ => Err(self.error_at(
                at.pos,
                format!("Expect exactly one word for {what}, got {count}"),
            )),
        }
    }

    /// Like [`as_single_string`](Self::as_single_string), attributed to the
    /// innermost executing node.
    pub fn expect_single_string(&self, values: &[Value], what: &str) -> EvalResult<String> {
        match values {
            [Value::String(s)] => Ok(s.clone()),
            [other] => Err(self.error(format!("Expect string for {what}, got {}", other.repr()))),
            _ => Err(self.error(format!(
                "Expect exactly one word for {what}, got {}",
                values.len()
            ))),
        }
    }

    // --- status ---

    /// Hand `statuses` to the status callback unless they are all success.
    pub fn report_status(&self, statuses: &[Value]) {
        if !status_ok(statuses) {
            (self.status_cb)(statuses);
        }
    }

    pub fn set_status_callback(&mut self, callback: impl Fn(&[Value]) + Send + Sync + 'static) {
        self.status_cb = Arc::new(callback);
    }

    // --- accessors ---

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Background jobs, shared with every copy of this evaluator.
    pub fn jobs(&self) -> &Arc<JobManager> {
        &self.jobs
    }

    /// Wait for every background job, including jobs they start.
    pub async fn wait_jobs(&self) -> Vec<(JobId, EvalResult<Vec<Value>>)> {
        self.jobs.wait_all().await
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        self.compiler.tools()
    }

    pub(crate) fn pipe_buffer_size(&self) -> usize {
        self.pipe_buffer_size
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("name", &self.name)
            .field("ports", &self.ports)
            .field("depth", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

/// Sets the evaluator's source name and text, and clears them on drop.
///
/// Drop runs on success, on error and when the evaluation future is
/// dropped mid-flight.
struct SourceGuard<'a> {
    ev: &'a mut Evaluator,
}

impl<'a> SourceGuard<'a> {
    fn enter(ev: &'a mut Evaluator, name: &str, text: Arc<str>) -> Self {
        ev.name = name.to_string();
        ev.text = text;
        Self { ev }
    }
}

impl Deref for SourceGuard<'_> {
    type Target = Evaluator;

    fn deref(&self) -> &Evaluator {
        self.ev
    }
}

impl DerefMut for SourceGuard<'_> {
    fn deref_mut(&mut self) -> &mut Evaluator {
        self.ev
    }
}

impl Drop for SourceGuard<'_> {
    fn drop(&mut self) {
        self.ev.name.clear();
        self.ev.text = Arc::from("");
    }
}
