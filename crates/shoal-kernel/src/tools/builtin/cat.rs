//! cat: copy files, or port 0, to port 1.

use async_trait::async_trait;

use shoal_types::Value;

use crate::interpreter::{EvalResult, Evaluator};
use crate::tools::{Tool, ToolSchema};

const CHUNK_SIZE: usize = 8192;

pub struct Cat;

#[async_trait]
impl Tool for Cat {
    fn name(&self) -> &str {
        "cat"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("cat", "Copy files or standard input to standard output")
            .usage("cat [file...]")
    }

    async fn execute(&self, args: &[Value], ev: &mut Evaluator) -> EvalResult<Value> {
        if args.is_empty() {
            copy_input(ev).await?;
            return Ok(Value::string(""));
        }

        for arg in args {
            let Value::String(path) = arg else {
                return Err(ev.error(format!("Expect string for file name, got {}", arg.repr())));
            };
            let data = tokio::fs::read(path)
                .await
                .map_err(|e| ev.error(format!("cat: {path}: {e}")))?;
            ev.write_port(1, &data).await?;
        }
        Ok(Value::string(""))
    }
}

/// Stream port 0 to port 1 without buffering the whole input.
async fn copy_input(ev: &Evaluator) -> EvalResult<()> {
    let Some(input) = ev.channel(0) else {
        return Err(ev.error("port 0 is not open"));
    };
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = input
            .read(&mut buf)
            .await
            .map_err(|e| ev.error(format!("cat: read: {e}")))?;
        if n == 0 {
            return Ok(());
        }
        ev.write_port(1, &buf[..n]).await?;
    }
}
