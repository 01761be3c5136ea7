//! echo, print: write arguments to port 1.

use async_trait::async_trait;

use shoal_types::Value;

use crate::interpreter::{EvalResult, Evaluator};
use crate::tools::{Tool, ToolSchema};

fn join(args: &[Value]) -> String {
    args.iter().map(Value::to_string).collect::<Vec<_>>().join(" ")
}

/// Arguments separated by spaces, then a newline.
pub struct Echo;

#[async_trait]
impl Tool for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("echo", "Print arguments followed by a newline").usage("echo [arg...]")
    }

    async fn execute(&self, args: &[Value], ev: &mut Evaluator) -> EvalResult<Value> {
        let mut line = join(args);
        line.push('\n');
        ev.write_port(1, line.as_bytes()).await?;
        Ok(Value::string(""))
    }
}

/// Like echo, without the newline.
pub struct Print;

#[async_trait]
impl Tool for Print {
    fn name(&self) -> &str {
        "print"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("print", "Print arguments without a trailing newline").usage("print [arg...]")
    }

    async fn execute(&self, args: &[Value], ev: &mut Evaluator) -> EvalResult<Value> {
        ev.write_port(1, join(args).as_bytes()).await?;
        Ok(Value::string(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::test_support::evaluator_with_stdout;

    #[tokio::test]
    async fn echo_joins_with_spaces() {
        let (mut ev, out) = evaluator_with_stdout();
        let status = Echo
            .execute(&[Value::from("hello"), Value::from("world")], &mut ev)
            .await
            .unwrap();
        assert_eq!(status, Value::from(""));
        assert_eq!(out.contents_string(), "hello world\n");
    }

    #[tokio::test]
    async fn echo_without_args_prints_newline() {
        let (mut ev, out) = evaluator_with_stdout();
        Echo.execute(&[], &mut ev).await.unwrap();
        assert_eq!(out.contents_string(), "\n");
    }

    #[tokio::test]
    async fn echo_flattens_lists() {
        let (mut ev, out) = evaluator_with_stdout();
        let list = Value::List(vec![Value::from("a"), Value::from("b")]);
        Echo.execute(&[list], &mut ev).await.unwrap();
        assert_eq!(out.contents_string(), "a b\n");
    }

    #[tokio::test]
    async fn print_has_no_newline() {
        let (mut ev, out) = evaluator_with_stdout();
        Print.execute(&[Value::from("x")], &mut ev).await.unwrap();
        assert_eq!(out.contents_string(), "x");
    }
}
