//! help: list the builtins.

use async_trait::async_trait;

use shoal_types::Value;

use crate::interpreter::{EvalResult, Evaluator};
use crate::tools::{Tool, ToolSchema};

pub struct Help;

#[async_trait]
impl Tool for Help {
    fn name(&self) -> &str {
        "help"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("help", "List builtin commands").usage("help [command]")
    }

    async fn execute(&self, args: &[Value], ev: &mut Evaluator) -> EvalResult<Value> {
        let schemas = ev.tools().schemas();
        let out = if args.is_empty() {
            let width = schemas.iter().map(|s| s.usage.len()).max().unwrap_or(0);
            let mut out = String::new();
            for schema in &schemas {
                out.push_str(&format!("  {:<width$}  {}\n", schema.usage, schema.description));
            }
            out
        } else {
            let name = ev.expect_single_string(args, "command name")?;
            match schemas.iter().find(|s| s.name == name) {
                Some(schema) => format!("{}\n  {}\n", schema.usage, schema.description),
                None => return Ok(Value::string(format!("no builtin named {name}"))),
            }
        };
        ev.write_port(1, out.as_bytes()).await?;
        Ok(Value::string(""))
    }
}
