//! Meta-command and evaluation behaviour of the REPL front end.

use shoal_kernel::EvaluatorConfig;
use shoal_repl::Repl;

fn repl() -> Repl {
    let config = EvaluatorConfig::isolated()
        .with_env(vec![("HOME".to_string(), "/home/test".to_string())])
        .with_status_callback(|_| {});
    Repl::with_config(config).expect("repl")
}

#[test]
fn blank_line_is_silent() {
    let mut repl = repl();
    assert!(repl.process_line("   ").expect("process").is_none());
}

#[test]
fn help_lists_meta_commands() {
    let mut repl = repl();
    let out = repl.process_line("/help").expect("process").expect("output");
    assert!(out.contains("/quit"));
    assert!(out.contains("/scope"));
}

#[test]
fn quit_requests_exit() {
    let mut repl = repl();
    let err = repl.process_line("/quit").expect_err("should exit");
    assert_eq!(err.to_string(), "__REPL_EXIT__");
}

#[test]
fn unknown_meta_command() {
    let mut repl = repl();
    let out = repl.process_line("/frobnicate").expect("process").expect("output");
    assert!(out.contains("Unknown command: /frobnicate"));
}

#[test]
fn scope_shows_variables_as_json() {
    let mut repl = repl();
    assert!(repl.process_line("var greeting = hello").expect("process").is_none());
    let out = repl.process_line("/scope").expect("process").expect("output");
    let json: serde_json::Value = serde_json::from_str(&out).expect("json");
    assert_eq!(json["greeting"], "hello");
    assert!(json.get("pid").is_some());
}

#[test]
fn variables_persist_between_lines() {
    let mut repl = repl();
    repl.process_line("var x = one").expect("process");
    repl.process_line("set x = two").expect("process");
    let value = repl.evaluator().scope().get("x").expect("bound");
    assert_eq!(value.to_string(), "two");
}

#[test]
fn ast_mode_parses_without_running() {
    let mut repl = repl();
    let on = repl.process_line("/ast").expect("process").expect("output");
    assert_eq!(on, "AST mode: ON");

    let out = repl.process_line("var y = 1").expect("process").expect("output");
    assert!(out.contains("Chunk"));
    assert!(!repl.evaluator().scope().contains("y"));

    let off = repl.process_line("/ast").expect("process").expect("output");
    assert_eq!(off, "AST mode: OFF");
}

#[test]
fn ports_lists_standard_streams() {
    let mut repl = repl();
    let out = repl.process_line("/ports").expect("process").expect("output");
    assert!(out.starts_with("Ports:"));
    assert!(out.contains("0: "));
    assert!(out.contains("2: "));
}

#[test]
fn tools_lists_builtins() {
    let mut repl = repl();
    let out = repl.process_line("/tools").expect("process").expect("output");
    assert!(out.contains("echo"));
    assert!(out.contains("help"));
}

#[test]
fn evaluation_errors_are_returned_as_text() {
    let mut repl = repl();
    let out = repl.process_line("echo $missing").expect("process").expect("output");
    assert!(out.starts_with("Error:"));
    assert!(out.contains("variable $missing not found"));
}

#[test]
fn errors_do_not_poison_later_lines() {
    let mut repl = repl();
    repl.process_line("fail boom").expect("process");
    assert!(repl.process_line("var z = ok").expect("process").is_none());
    assert!(repl.evaluator().scope().contains("z"));
}

#[test]
fn jobs_lists_background_pipelines() {
    let mut repl = repl();
    let out = repl.process_line("/jobs").expect("process").expect("output");
    assert_eq!(out, "(no background jobs)");

    assert!(repl.process_line("true &").expect("process").is_none());
    repl.wait_jobs();
    let out = repl.process_line("/jobs").expect("process").expect("output");
    assert_eq!(out, "Background jobs:\n  [1] Done true &");
}
