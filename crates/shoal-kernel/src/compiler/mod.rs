//! Compiler: syntax tree to executable operations.
//!
//! Compilation runs the static checks (unbound variables, `set` without
//! `var`, indexing a string) against a snapshot of the scope's types, then
//! builds a tree of [`Op`]s. Every op built from a node is wrapped in
//! `Tracked`, which keeps the evaluator's diagnostic stack in step with
//! execution so a runtime error can name the innermost node.

mod ops;
mod redir;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use shoal_types::{Type, Value};

use crate::ast::{Chunk, Form, FormKind, Node, NodeMark, Pipeline, Pos, Redir, RedirKind, Term, TermKind};
use crate::diag::ContextualError;
use crate::interpreter::{EvalError, EvalResult, Evaluator};
use crate::scheduler::PipelineOp;
use crate::tools::ToolRegistry;

use ops::{
    AssignOp, CaptureOp, ChunkOp, CommandHead, CommandOp, CommandTarget, IndexOp, ListOp, LiteralOp,
    VariableOp,
};
use redir::{RedirAction, RedirSpec};

/// An executable operation.
///
/// `exec` yields the values the operation produces: the status values of a
/// pipeline, or the values of a term.
#[async_trait]
pub trait Op: Send + Sync {
    async fn exec(&self, ev: &mut Evaluator) -> EvalResult<Vec<Value>>;
}

pub type OpRef = Arc<dyn Op>;

/// Runs `inner` with `mark` on top of the diagnostic stack.
pub(crate) struct Tracked<O> {
    mark: NodeMark,
    inner: O,
}

#[async_trait]
impl<O: Op> Op for Tracked<O> {
    async fn exec(&self, ev: &mut Evaluator) -> EvalResult<Vec<Value>> {
        ev.push(self.mark);
        let result = self.inner.exec(ev).await;
        ev.pop();
        result
    }
}

fn tracked(node: &impl Node, op: impl Op + 'static) -> OpRef {
    Arc::new(Tracked {
        mark: node.mark(),
        inner: op,
    })
}

/// Turns parsed chunks into ops. Holds the tool table used to resolve
/// command heads.
pub struct Compiler {
    tools: Arc<ToolRegistry>,
}

impl Compiler {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Compile `chunk`, checking names against `scope`.
    ///
    /// Returns `None` for a chunk with nothing in it.
    pub fn compile(
        &self,
        name: &str,
        text: &str,
        chunk: &Chunk,
        scope: &HashMap<String, Type>,
    ) -> EvalResult<Option<OpRef>> {
        if chunk.is_empty() {
            return Ok(None);
        }
        let mut cx = Context {
            name,
            text,
            tools: &self.tools,
            scope: scope.clone(),
        };
        let op = cx.chunk(chunk, true)?;
        tracing::debug!(pipelines = chunk.pipelines.len(), "compiled");
        Ok(Some(op))
    }
}

struct Context<'a> {
    name: &'a str,
    text: &'a str,
    tools: &'a ToolRegistry,
    /// Static types, including names declared earlier in this compilation.
    scope: HashMap<String, Type>,
}

impl Context<'_> {
    fn error(&self, pos: Pos, message: impl Into<String>) -> EvalError {
        EvalError::Compile(ContextualError::new(
            self.name,
            Arc::from(self.text),
            pos,
            message,
        ))
    }

    fn chunk(&mut self, chunk: &Chunk, report: bool) -> EvalResult<OpRef> {
        let pipelines = chunk
            .pipelines
            .iter()
            .map(|p| self.pipeline(p))
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(tracked(chunk, ChunkOp { pipelines, report }))
    }

    fn pipeline(&mut self, pipeline: &Pipeline) -> EvalResult<OpRef> {
        let forms = pipeline
            .forms
            .iter()
            .map(|f| self.form(f))
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(tracked(pipeline, PipelineOp::new(forms, pipeline.background)))
    }

    fn form(&mut self, form: &Form) -> EvalResult<OpRef> {
        match &form.kind {
            FormKind::Command { head, args, redirs } => {
                let head = self.command_head(head)?;
                let args = args
                    .iter()
                    .map(|a| self.term(a).map(|(op, _)| op))
                    .collect::<EvalResult<Vec<_>>>()?;
                let redirs = redirs
                    .iter()
                    .map(|r| self.redir(r))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(tracked(form, CommandOp { head, args, redirs }))
            }
            FormKind::Assign {
                declare,
                name,
                name_pos,
                values,
            } => {
                if !*declare && !self.scope.contains_key(name) {
                    return Err(self.error(*name_pos, format!("variable ${name} not found")));
                }
                let compiled = values
                    .iter()
                    .map(|v| self.term(v))
                    .collect::<EvalResult<Vec<_>>>()?;
                let ty = match compiled.as_slice() {
                    [(_, ty)] => *ty,
                    _ => Type::Any,
                };
                // Declared after the values compile: `var x = $x` reads the old x.
                self.scope.insert(name.clone(), ty);
                let values = compiled.into_iter().map(|(op, _)| op).collect();
                Ok(tracked(
                    form,
                    AssignOp {
                        declare: *declare,
                        name: name.clone(),
                        values,
                    },
                ))
            }
        }
    }

    fn command_head(&mut self, head: &Term) -> EvalResult<CommandHead> {
        match &head.kind {
            TermKind::Bareword(name) => Ok(CommandHead::Static(CommandTarget::resolve(
                self.tools, name,
            ))),
            _ => {
                let (op, _) = self.term(head)?;
                Ok(CommandHead::Dynamic {
                    op,
                    mark: head.mark(),
                })
            }
        }
    }

    fn term(&mut self, term: &Term) -> EvalResult<(OpRef, Type)> {
        let (op, ty) = match &term.kind {
            TermKind::Bareword(s) | TermKind::Quoted(s) => {
                (tracked(term, LiteralOp(Value::string(s.clone()))), Type::String)
            }
            TermKind::Variable(name) => {
                let Some(ty) = self.scope.get(name).copied() else {
                    return Err(self.error(term.pos, format!("variable ${name} not found")));
                };
                (tracked(term, VariableOp { name: name.clone() }), ty)
            }
            TermKind::Capture(chunk) => {
                let body = if chunk.is_empty() {
                    None
                } else {
                    Some(self.chunk(chunk, false)?)
                };
                (tracked(term, CaptureOp { body }), Type::String)
            }
            TermKind::List(items) => {
                let items = items
                    .iter()
                    .map(|i| self.term(i).map(|(op, _)| op))
                    .collect::<EvalResult<Vec<_>>>()?;
                (tracked(term, ListOp { items }), Type::List)
            }
            TermKind::Index { base, index } => {
                let (base_op, base_ty) = self.term(base)?;
                if base_ty == Type::String {
                    return Err(self.error(index.pos, "cannot index a string"));
                }
                let (index_op, _) = self.term(index)?;
                let ty = match base_ty {
                    Type::Env => Type::String,
                    _ => Type::Any,
                };
                let op = IndexOp {
                    base: base_op,
                    index: index_op,
                    index_mark: index.mark(),
                };
                (tracked(term, op), ty)
            }
        };
        Ok((op, ty))
    }

    fn redir(&mut self, redir: &Redir) -> EvalResult<RedirSpec> {
        let action = match &redir.kind {
            RedirKind::File { mode, target } => {
                let (op, _) = self.term(target)?;
                RedirAction::File {
                    mode: *mode,
                    target: op,
                    target_mark: target.mark(),
                }
            }
            RedirKind::Dup(src) => RedirAction::Dup(*src),
            RedirKind::Close => RedirAction::Close,
        };
        Ok(RedirSpec {
            mark: redir.mark(),
            fd: redir.fd,
            action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::tools::register_builtins;

    fn compile(src: &str, scope: &[(&str, Type)]) -> EvalResult<Option<OpRef>> {
        let mut tools = ToolRegistry::new();
        register_builtins(&mut tools);
        let compiler = Compiler::new(Arc::new(tools));
        let chunk = parse("t", src).unwrap();
        let scope = scope.iter().map(|(k, t)| (k.to_string(), *t)).collect();
        compiler.compile("t", src, &chunk, &scope)
    }

    #[test]
    fn empty_chunk_compiles_to_nothing() {
        assert!(compile("", &[]).unwrap().is_none());
        assert!(compile("  # just a comment\n", &[]).unwrap().is_none());
    }

    #[test]
    fn unbound_variable_is_rejected_with_position() {
        let err = compile("echo $nope", &[]).err().unwrap();
        assert!(matches!(err, EvalError::Compile(_)));
        assert_eq!(err.message(), "variable $nope not found");
        assert_eq!(err.position(), Some(5));
    }

    #[test]
    fn snapshot_names_are_accepted() {
        assert!(compile("echo $x", &[("x", Type::String)]).unwrap().is_some());
    }

    #[test]
    fn var_declares_for_later_pipelines() {
        assert!(compile("var x = 1; echo $x", &[]).is_ok());
        assert!(compile("echo $x; var x = 1", &[]).is_err());
    }

    #[test]
    fn var_value_cannot_refer_to_itself() {
        let err = compile("var x = $x", &[]).err().unwrap();
        assert_eq!(err.message(), "variable $x not found");
    }

    #[test]
    fn set_requires_existing_name() {
        let err = compile("set y = 1", &[]).err().unwrap();
        assert_eq!(err.position(), Some(4));
        assert!(compile("set y = 1", &[("y", Type::String)]).is_ok());
    }

    #[test]
    fn indexing_a_string_is_rejected() {
        let err = compile("echo $s[0]", &[("s", Type::String)]).err().unwrap();
        assert_eq!(err.message(), "cannot index a string");
        assert!(compile("echo $l[0]", &[("l", Type::List)]).is_ok());
        assert!(compile("echo $env[HOME]", &[("env", Type::Env)]).is_ok());
    }

    #[test]
    fn unknown_commands_compile_as_external() {
        assert!(compile("definitely-not-a-builtin a b", &[]).is_ok());
    }
}
