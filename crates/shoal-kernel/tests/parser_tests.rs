//! Parser tests: tree shape, node positions and error locations.

use rstest::rstest;
use shoal_kernel::ast::{Chunk, Form, FormKind, RedirKind, RedirMode, Term, TermKind};
use shoal_kernel::parse;

fn parse_ok(source: &str) -> Chunk {
    match parse("test", source) {
        Ok(chunk) => chunk,
        Err(e) => panic!("parse failed for {source:?}:\n{e}"),
    }
}

fn only_form(chunk: &Chunk) -> &Form {
    assert_eq!(chunk.pipelines.len(), 1, "expected one pipeline");
    assert_eq!(chunk.pipelines[0].forms.len(), 1, "expected one form");
    &chunk.pipelines[0].forms[0]
}

fn command(form: &Form) -> (&Term, &[Term], &[shoal_kernel::ast::Redir]) {
    match &form.kind {
        FormKind::Command { head, args, redirs } => (head, args, redirs),
        other => panic!("expected command, got {other:?}"),
    }
}

fn word(term: &Term) -> &str {
    match &term.kind {
        TermKind::Bareword(w) | TermKind::Quoted(w) => w,
        other => panic!("expected string term, got {other:?}"),
    }
}

#[test]
fn simple_command() {
    let chunk = parse_ok("echo hello world");
    let (head, args, redirs) = command(only_form(&chunk));
    assert_eq!(word(head), "echo");
    assert_eq!(args.iter().map(word).collect::<Vec<_>>(), ["hello", "world"]);
    assert!(redirs.is_empty());
}

#[rstest]
#[case::newlines("a\nb\nc", 3)]
#[case::semicolons("a; b; c", 3)]
#[case::blank_lines("\n\na\n\n\nb\n", 2)]
#[case::trailing_semicolon("a;", 1)]
fn pipelines_are_separated(#[case] source: &str, #[case] count: usize) {
    assert_eq!(parse_ok(source).pipelines.len(), count);
}

#[test]
fn pipeline_forms_and_background() {
    let chunk = parse_ok("a | b |\n c &");
    let pipeline = &chunk.pipelines[0];
    assert_eq!(pipeline.forms.len(), 3);
    assert!(pipeline.background);
    assert!(!parse_ok("a | b").pipelines[0].background);
}

#[test]
fn positions_are_byte_offsets() {
    let chunk = parse_ok("x; echo (fail boom)");
    let pipeline = &chunk.pipelines[1];
    assert_eq!(pipeline.pos, 3);
    let (head, args, _) = command(&pipeline.forms[0]);
    assert_eq!(head.pos, 3);
    assert_eq!(args[0].pos, 8);
    let TermKind::Capture(inner) = &args[0].kind else {
        panic!("expected capture");
    };
    assert_eq!(inner.pipelines[0].forms[0].pos, 9);
}

#[rstest]
#[case::declare("var x = 5", true)]
#[case::assign("set x = 5", false)]
fn assignments(#[case] source: &str, #[case] expect_declare: bool) {
    let chunk = parse_ok(source);
    match &only_form(&chunk).kind {
        FormKind::Assign {
            declare,
            name,
            name_pos,
            values,
        } => {
            assert_eq!(*declare, expect_declare);
            assert_eq!(name, "x");
            assert_eq!(*name_pos, 4);
            assert_eq!(values.len(), 1);
        }
        other => panic!("expected assignment, got {other:?}"),
    }
}

#[test]
fn set_as_plain_command() {
    let chunk = parse_ok("set");
    let (head, args, _) = command(only_form(&chunk));
    assert_eq!(word(head), "set");
    assert!(args.is_empty());
}

#[test]
fn nested_terms() {
    let chunk = parse_ok("echo [a (echo b) $c] $l[0] 'q'");
    let (_, args, _) = command(only_form(&chunk));
    let TermKind::List(items) = &args[0].kind else {
        panic!("expected list");
    };
    assert_eq!(items.len(), 3);
    assert!(matches!(items[1].kind, TermKind::Capture(_)));
    assert!(matches!(items[2].kind, TermKind::Variable(ref n) if n == "c"));
    assert!(matches!(args[1].kind, TermKind::Index { .. }));
    assert!(matches!(args[2].kind, TermKind::Quoted(ref s) if s == "q"));
}

#[test]
fn capture_may_span_lines() {
    let chunk = parse_ok("echo (\n  echo a\n  echo b\n)");
    let (_, args, _) = command(only_form(&chunk));
    let TermKind::Capture(inner) = &args[0].kind else {
        panic!("expected capture");
    };
    assert_eq!(inner.pipelines.len(), 2);
}

#[rstest]
#[case::write("echo hi > out", 1, RedirMode::Write)]
#[case::append("echo hi >> out", 1, RedirMode::Append)]
#[case::read("cat < in", 0, RedirMode::Read)]
#[case::read_write("cat <> f", 0, RedirMode::ReadWrite)]
#[case::explicit_fd("cmd 2> err", 2, RedirMode::Write)]
fn file_redirections(#[case] source: &str, #[case] fd: usize, #[case] mode: RedirMode) {
    let chunk = parse_ok(source);
    let (_, _, redirs) = command(only_form(&chunk));
    assert_eq!(redirs.len(), 1);
    assert_eq!(redirs[0].fd, fd);
    match &redirs[0].kind {
        RedirKind::File { mode: m, target } => {
            assert_eq!(*m, mode);
            assert!(matches!(target.kind, TermKind::Bareword(_)));
        }
        other => panic!("expected file redirection, got {other:?}"),
    }
}

#[test]
fn dup_and_close_redirections() {
    let chunk = parse_ok("cmd 2>&1 >&-");
    let (_, _, redirs) = command(only_form(&chunk));
    assert_eq!(redirs[0].fd, 2);
    assert_eq!(redirs[0].kind, RedirKind::Dup(1));
    assert_eq!(redirs[1].fd, 1);
    assert_eq!(redirs[1].kind, RedirKind::Close);
}

#[rstest]
#[case::unclosed_capture("echo (a", 7, "found end of input")]
#[case::stray_paren("echo )", 5, "found ')'")]
#[case::unclosed_list("echo [a", 7, "found end of input")]
#[case::dangling_pipe("a |", 3, "found end of input")]
#[case::missing_target("echo >", 6, "found end of input")]
#[case::empty_assignment("var x =", 7, "found end of input")]
fn parse_errors(#[case] source: &str, #[case] pos: usize, #[case] found: &str) {
    let err = parse("test", source).unwrap_err();
    assert_eq!(err.pos, pos, "{err}");
    assert!(err.message.contains(found), "{}", err.message);
    assert_eq!(err.name, "test");
}

#[rstest]
#[case::huge_fd("echo x 100000000000000>&1", 7)]
#[case::max_fd("echo x 18446744073709551615>&1", 7)]
#[case::huge_dup_source("echo x 1>&99999999999999999999", 7)]
#[case::file_fd("echo x 5000> out", 7)]
fn out_of_range_ports_are_parse_errors(#[case] source: &str, #[case] pos: usize) {
    let err = parse("test", source).unwrap_err();
    assert_eq!(err.pos, pos, "{err}");
    assert!(err.message.contains("out of range"), "{}", err.message);
}

#[test]
fn lex_errors_surface_as_parse_errors() {
    let err = parse("script", "echo 'open").unwrap_err();
    assert_eq!(err.pos, 5);
    assert!(err.to_string().starts_with("script:1:6: unterminated string"));
}
