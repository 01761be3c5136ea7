//! fail: raise an error with the given message.

use async_trait::async_trait;

use shoal_types::Value;

use crate::interpreter::{EvalResult, Evaluator};
use crate::tools::{Tool, ToolSchema};

pub struct Fail;

#[async_trait]
impl Tool for Fail {
    fn name(&self) -> &str {
        "fail"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new("fail", "Abort evaluation with an error").usage("fail [message...]")
    }

    async fn execute(&self, args: &[Value], ev: &mut Evaluator) -> EvalResult<Value> {
        let message = if args.is_empty() {
            "failed".to_string()
        } else {
            args.iter().map(Value::to_string).collect::<Vec<_>>().join(" ")
        };
        Err(ev.error(message))
    }
}
