//! true/false: fixed statuses.
//!
//! `false` yields the status string `false`, which the status policy
//! treats as failure.

use async_trait::async_trait;

use shoal_types::Value;

use crate::interpreter::{EvalResult, Evaluator};
use crate::tools::{Tool, ToolSchema};

pub struct True;

#[async_trait]
impl Tool for True {
    fn name(&self) -> &str {
        "true"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("true", "Succeed without doing anything")
    }

    async fn execute(&self, _args: &[Value], _ev: &mut Evaluator) -> EvalResult<Value> {
        Ok(Value::string(""))
    }
}

pub struct False;

#[async_trait]
impl Tool for False {
    fn name(&self) -> &str {
        "false"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("false", "Fail without doing anything")
    }

    async fn execute(&self, _args: &[Value], _ev: &mut Evaluator) -> EvalResult<Value> {
        Ok(Value::string("false"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::status_ok;
    use crate::tools::builtin::test_support::evaluator_with_stdout;

    #[tokio::test]
    async fn true_is_success() {
        let (mut ev, _) = evaluator_with_stdout();
        let status = True.execute(&[], &mut ev).await.unwrap();
        assert!(status_ok(&[status]));
    }

    #[tokio::test]
    async fn false_is_failure() {
        let (mut ev, out) = evaluator_with_stdout();
        let status = False.execute(&[Value::from("ignored")], &mut ev).await.unwrap();
        assert_eq!(status, Value::from("false"));
        assert!(!status_ok(&[status]));
        assert!(out.contents().is_empty());
    }
}
