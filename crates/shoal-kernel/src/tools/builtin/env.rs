//! env: print the environment mirror, or one variable of it.

use async_trait::async_trait;

use shoal_types::Value;

use crate::interpreter::{EvalResult, Evaluator};
use crate::tools::{Tool, ToolSchema};

pub struct EnvTool;

#[async_trait]
impl Tool for EnvTool {
    fn name(&self) -> &str {
        "env"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("env", "Print environment variables").usage("env [name]")
    }

    async fn execute(&self, args: &[Value], ev: &mut Evaluator) -> EvalResult<Value> {
        if args.is_empty() {
            let mut out = String::new();
            for (key, value) in ev.env().iter() {
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                out.push('\n');
            }
            ev.write_port(1, out.as_bytes()).await?;
            return Ok(Value::string(""));
        }

        let name = ev.expect_single_string(args, "variable name")?;
        match ev.env().get(&name) {
            Some(value) => {
                let line = format!("{value}\n");
                ev.write_port(1, line.as_bytes()).await?;
                Ok(Value::string(""))
            }
            None => Ok(Value::string(format!("env: {name} not set"))),
        }
    }
}
