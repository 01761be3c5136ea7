//! Built-in tools.

mod cat;
mod echo;
mod env;
mod fail;
mod help;
mod true_false;

use super::ToolRegistry;

/// Register every builtin in `registry`.
pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register(echo::Echo);
    registry.register(echo::Print);
    registry.register(cat::Cat);
    registry.register(true_false::True);
    registry.register(true_false::False);
    registry.register(fail::Fail);
    registry.register(env::EnvTool);
    registry.register(help::Help);
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::config::EvaluatorConfig;
    use crate::interpreter::{Channel, Evaluator, MemoryChannel, Port};

    /// Isolated evaluator whose stdout is an in-memory buffer.
    pub fn evaluator_with_stdout() -> (Evaluator, Arc<MemoryChannel>) {
        let mut ev = Evaluator::with_config(EvaluatorConfig::isolated().with_env([("HOME", "/home/test")]));
        let out = MemoryChannel::new();
        ev.set_port(1, Port::borrowed(Channel::Memory(out.clone()))).unwrap();
        (ev, out)
    }
}
