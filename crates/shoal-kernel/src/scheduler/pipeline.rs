//! Pipeline execution.

use std::sync::Arc;

use async_trait::async_trait;

use shoal_types::Value;

use crate::compiler::{Op, OpRef};
use crate::interpreter::{Channel, EvalError, EvalResult, Evaluator, Port};

use super::pipe_stream::pipe_stream;

pub(crate) struct PipelineOp {
    forms: Arc<[OpRef]>,
    background: bool,
}

impl PipelineOp {
    pub fn new(forms: Vec<OpRef>, background: bool) -> Self {
        Self {
            forms: forms.into(),
            background,
        }
    }
}

#[async_trait]
impl Op for PipelineOp {
    async fn exec(&self, ev: &mut Evaluator) -> EvalResult<Vec<Value>> {
        if !self.background {
            return run_stages(&self.forms, ev).await;
        }

        let label = format!("{} &", ev.name());
        let command = job_command(ev);
        let mut job = ev.copy(label, true);
        let forms = self.forms.clone();
        tracing::debug!(stages = forms.len(), "pipeline moved to background");
        ev.jobs().spawn(command, async move {
            let result = run_stages(&forms, &mut job).await;
            if let Err(e) = &result {
                tracing::warn!(error = %e, "background pipeline failed");
                let _ = job.write_port(2, format!("{e}\n").as_bytes()).await;
            }
            job.close_ports().await;
            result
        });
        Ok(vec![Value::string("")])
    }
}

/// Source line of the pipeline being started, for job listings.
fn job_command(ev: &Evaluator) -> String {
    let text = ev.text();
    let start = ev.current_node().map_or(0, |mark| mark.pos).min(text.len());
    text.get(start..)
        .and_then(|rest| rest.lines().next())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Run `forms` connected by pipes and wait for all of them.
///
/// Yields every stage's statuses in order, or the first error raised by
/// any stage. A failing stage does not cancel its siblings: closing its
/// ports gives its neighbours EOF or a dropped reader, and they wind down.
#[tracing::instrument(level = "debug", skip_all, fields(stages = forms.len()))]
async fn run_stages(forms: &[OpRef], ev: &mut Evaluator) -> EvalResult<Vec<Value>> {
    let label = ev.name().to_string();
    let last = forms.len().saturating_sub(1);
    let mut next_input: Option<Port> = None;
    let mut handles = Vec::with_capacity(forms.len());

    for (i, form) in forms.iter().enumerate() {
        let mut stage = ev.copy(label.clone(), false);
        if let Some(input) = next_input.take() {
            stage.set_port(0, input)?;
        }
        if i < last {
            let (writer, reader) = pipe_stream(ev.pipe_buffer_size());
            stage.set_port(1, Port::owned(Channel::pipe_writer(writer)))?;
            next_input = Some(Port::owned(Channel::pipe_reader(reader)));
        }

        let form = form.clone();
        handles.push(tokio::spawn(async move {
            let result = form.exec(&mut stage).await;
            stage.close_ports().await;
            result
        }));
    }

    let mut statuses = Vec::with_capacity(forms.len());
    let mut first_error: Option<EvalError> = None;
    for (i, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(Ok(values)) => statuses.extend(values),
            Ok(Err(e)) => {
                tracing::debug!(stage = i, error = %e, "stage failed");
                first_error.get_or_insert(e);
            }
            Err(join) => {
                first_error.get_or_insert(EvalError::Plain(format!("pipeline stage {i} aborted: {join}")));
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(statuses),
    }
}
