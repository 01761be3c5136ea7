//! Ops for chunks, forms and terms.

use std::sync::Arc;

use async_trait::async_trait;

use shoal_types::Value;

use crate::ast::NodeMark;
use crate::interpreter::{Channel, EvalResult, Evaluator, MemoryChannel, Port};
use crate::tools::{run_external, Tool, ToolRegistry};

use super::redir::RedirSpec;
use super::{Op, OpRef};

/// Run ops in order, concatenating what they yield.
async fn collect(ops: &[OpRef], ev: &mut Evaluator) -> EvalResult<Vec<Value>> {
    let mut values = Vec::new();
    for op in ops {
        values.extend(op.exec(ev).await?);
    }
    Ok(values)
}

pub(crate) struct ChunkOp {
    pub pipelines: Vec<OpRef>,
    /// Report each pipeline's statuses. Only the top-level chunk does.
    pub report: bool,
}

#[async_trait]
impl Op for ChunkOp {
    async fn exec(&self, ev: &mut Evaluator) -> EvalResult<Vec<Value>> {
        let mut last = Vec::new();
        for pipeline in &self.pipelines {
            let statuses = pipeline.exec(ev).await?;
            if self.report {
                ev.report_status(&statuses);
            }
            last = statuses;
        }
        Ok(last)
    }
}

/// What a command head names.
#[derive(Clone)]
pub(crate) enum CommandTarget {
    Tool(Arc<dyn Tool>),
    External(String),
}

impl CommandTarget {
    pub fn resolve(tools: &ToolRegistry, name: &str) -> Self {
        match tools.get(name) {
            Some(tool) => CommandTarget::Tool(tool),
            None => CommandTarget::External(name.to_string()),
        }
    }
}

pub(crate) enum CommandHead {
    /// Bareword head, resolved when compiled.
    Static(CommandTarget),
    /// Head computed at run time, e.g. `$cmd arg`.
    Dynamic { op: OpRef, mark: NodeMark },
}

pub(crate) struct CommandOp {
    pub head: CommandHead,
    pub args: Vec<OpRef>,
    pub redirs: Vec<RedirSpec>,
}

#[async_trait]
impl Op for CommandOp {
    async fn exec(&self, ev: &mut Evaluator) -> EvalResult<Vec<Value>> {
        let target = match &self.head {
            CommandHead::Static(target) => target.clone(),
            CommandHead::Dynamic { op, mark } => {
                let values = op.exec(ev).await?;
                let name = ev.as_single_string(*mark, values, "command name")?;
                CommandTarget::resolve(ev.tools(), &name)
            }
        };

        let args = collect(&self.args, ev).await?;
        for redir in &self.redirs {
            redir.apply(ev).await?;
        }

        let status = match target {
            CommandTarget::Tool(tool) => tool.execute(&args, ev).await?,
            CommandTarget::External(name) => run_external(&name, &args, ev).await?,
        };
        Ok(vec![status])
    }
}

pub(crate) struct AssignOp {
    pub declare: bool,
    pub name: String,
    pub values: Vec<OpRef>,
}

#[async_trait]
impl Op for AssignOp {
    async fn exec(&self, ev: &mut Evaluator) -> EvalResult<Vec<Value>> {
        let mut values = collect(&self.values, ev).await?;
        if values.len() != 1 {
            return Err(ev.error(format!(
                "Expect exactly one value for assignment, got {}",
                values.len()
            )));
        }
        let value = values.remove(0);
        if self.declare {
            ev.scope().declare(self.name.clone(), value);
        } else if !ev.scope().set(&self.name, value) {
            return Err(ev.error(format!("variable ${} not found", self.name)));
        }
        Ok(vec![Value::string("")])
    }
}

pub(crate) struct LiteralOp(pub Value);

#[async_trait]
impl Op for LiteralOp {
    async fn exec(&self, _ev: &mut Evaluator) -> EvalResult<Vec<Value>> {
        Ok(vec![self.0.clone()])
    }
}

pub(crate) struct VariableOp {
    pub name: String,
}

#[async_trait]
impl Op for VariableOp {
    async fn exec(&self, ev: &mut Evaluator) -> EvalResult<Vec<Value>> {
        match ev.scope().get(&self.name) {
            Some(value) => Ok(vec![value]),
            None => Err(ev.error(format!("variable ${} not found", self.name))),
        }
    }
}

pub(crate) struct ListOp {
    pub items: Vec<OpRef>,
}

#[async_trait]
impl Op for ListOp {
    async fn exec(&self, ev: &mut Evaluator) -> EvalResult<Vec<Value>> {
        Ok(vec![Value::List(collect(&self.items, ev).await?)])
    }
}

/// `(chunk)`: run the chunk with port 1 captured, yield the output.
pub(crate) struct CaptureOp {
    pub body: Option<OpRef>,
}

#[async_trait]
impl Op for CaptureOp {
    async fn exec(&self, ev: &mut Evaluator) -> EvalResult<Vec<Value>> {
        let Some(body) = &self.body else {
            return Ok(vec![Value::string("")]);
        };
        let label = ev.name().to_string();
        let mut child = ev.copy(label, false);
        let out = MemoryChannel::new();
        child.set_port(1, Port::owned(Channel::Memory(out.clone())))?;

        let result = body.exec(&mut child).await;
        child.close_ports().await;
        result?;

        let mut text = out.contents_string();
        let trimmed = text.trim_end_matches('\n').len();
        text.truncate(trimmed);
        Ok(vec![Value::String(text)])
    }
}

pub(crate) struct IndexOp {
    pub base: OpRef,
    pub index: OpRef,
    pub index_mark: NodeMark,
}

#[async_trait]
impl Op for IndexOp {
    async fn exec(&self, ev: &mut Evaluator) -> EvalResult<Vec<Value>> {
        let mut bases = self.base.exec(ev).await?;
        if bases.len() != 1 {
            return Err(ev.error(format!(
                "Expect exactly one value to index, got {}",
                bases.len()
            )));
        }
        let base = bases.remove(0);
        let values = self.index.exec(ev).await?;
        let key = ev.as_single_string(self.index_mark, values, "index")?;

        let value = match &base {
            Value::List(items) => {
                let Ok(i) = key.parse::<usize>() else {
                    return Err(ev.error_at(self.index_mark.pos, format!("invalid index: {key}")));
                };
                match items.get(i) {
                    Some(v) => v.clone(),
                    None => {
                        return Err(ev.error_at(
                            self.index_mark.pos,
                            format!("index out of range: {i} (length {})", items.len()),
                        ))
                    }
                }
            }
            Value::Env(env) => match env.get(&key) {
                Some(v) => Value::string(v),
                None => {
                    return Err(ev.error_at(self.index_mark.pos, format!("no such key: {key}")))
                }
            },
            Value::String(_) => return Err(ev.error("cannot index a string")),
        };
        Ok(vec![value])
    }
}
