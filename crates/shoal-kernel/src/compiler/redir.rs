//! Redirections, applied to the evaluator running the form.

use tokio::fs::OpenOptions;

use crate::ast::{NodeMark, RedirMode};
use crate::interpreter::{Channel, EvalResult, Evaluator, Port};

use super::OpRef;

pub(crate) enum RedirAction {
    File {
        mode: RedirMode,
        target: OpRef,
        target_mark: NodeMark,
    },
    /// Make port `fd` a non-owning copy of this port.
    Dup(usize),
    Close,
}

pub(crate) struct RedirSpec {
    pub mark: NodeMark,
    pub fd: usize,
    pub action: RedirAction,
}

impl RedirSpec {
    pub async fn apply(&self, ev: &mut Evaluator) -> EvalResult<()> {
        ev.push(self.mark);
        let result = self.apply_inner(ev).await;
        ev.pop();
        result
    }

    async fn apply_inner(&self, ev: &mut Evaluator) -> EvalResult<()> {
        match &self.action {
            RedirAction::File {
                mode,
                target,
                target_mark,
            } => {
                let values = target.exec(ev).await?;
                let path = ev.as_single_string(*target_mark, values, "redirection target")?;
                let file = open_options(*mode)
                    .open(&path)
                    .await
                    .map_err(|e| ev.error(format!("failed to open {path}: {e}")))?;
                tracing::trace!(fd = self.fd, path = %path, ?mode, "redirect to file");
                ev.replace_port(self.fd, Port::owned(Channel::file(file))).await?;
            }
            RedirAction::Dup(src) => {
                let Some(channel) = ev.channel(*src) else {
                    return Err(ev.error(format!("port {src} is not open")));
                };
                // `N>&N` leaves the port as it is, ownership included.
                if ev.port(self.fd).is_some_and(|p| p.channel.same_as(&channel)) {
                    return Ok(());
                }
                ev.replace_port(self.fd, Port::borrowed(channel)).await?;
            }
            RedirAction::Close => ev.remove_port(self.fd).await,
        }
        Ok(())
    }
}

fn open_options(mode: RedirMode) -> OpenOptions {
    let mut options = OpenOptions::new();
    match mode {
        RedirMode::Read => options.read(true),
        RedirMode::Write => options.write(true).create(true).truncate(true),
        RedirMode::Append => options.append(true).create(true),
        RedirMode::ReadWrite => options.read(true).write(true).create(true).truncate(false),
    };
    options
}
