//! Lexer tests using rstest for parameterization.

use rstest::rstest;
use shoal_kernel::lexer::{tokenize, RedirOp, Token};

/// Format a Token into the test format string.
fn format_token(token: &Token) -> String {
    fn escape_for_display(s: &str) -> String {
        s.replace('\n', "\\n").replace('\t', "\\t").replace('\r', "\\r")
    }

    match token {
        Token::Newline => "NEWLINE".to_string(),
        Token::Semi => "SEMI".to_string(),
        Token::Pipe => "PIPE".to_string(),
        Token::Amp => "AMP".to_string(),
        Token::Eq => "EQ".to_string(),
        Token::LParen => "LPAREN".to_string(),
        Token::RParen => "RPAREN".to_string(),
        Token::LBracket => "LBRACKET".to_string(),
        Token::RBracket => "RBRACKET".to_string(),
        Token::Index => "INDEX".to_string(),
        Token::Redir(r) => {
            let fd = r.fd.map(|n| n.to_string()).unwrap_or_default();
            let op = match r.op {
                RedirOp::Read => "<".to_string(),
                RedirOp::Write => ">".to_string(),
                RedirOp::Append => ">>".to_string(),
                RedirOp::ReadWrite => "<>".to_string(),
                RedirOp::Dup(n) => format!(">&{n}"),
                RedirOp::Close => ">&-".to_string(),
            };
            format!("REDIR({fd}{op})")
        }
        Token::Variable(name) => format!("VAR({name})"),
        Token::SingleQuoted(s) | Token::DoubleQuoted(s) => format!("STR({})", escape_for_display(s)),
        Token::Bareword(w) => format!("WORD({w})"),
    }
}

/// Run a lexer test that expects successful tokenization.
fn run_lexer_test(input: &str, expected: &[&str]) {
    let tokens = tokenize(input).expect("lexing should succeed");
    let actual: Vec<String> = tokens.iter().map(|s| format_token(&s.token)).collect();
    let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    assert_eq!(actual, expected, "input: {:?}", input);
}

/// Run a lexer test that expects an error.
fn run_lexer_error_test(input: &str) {
    let result = tokenize(input);
    assert!(result.is_err(), "expected error for input: {:?}", input);
}

// =============================================================================
// Barewords
// =============================================================================

#[rstest]
#[case::word_simple("echo", &["WORD(echo)"])]
#[case::word_path("/usr/bin/env", &["WORD(/usr/bin/env)"])]
#[case::word_punctuated("a-b.c_d", &["WORD(a-b.c_d)"])]
#[case::word_number("42", &["WORD(42)"])]
#[case::word_glob_chars("*.rs", &["WORD(*.rs)"])]
#[case::two_words("echo hi", &["WORD(echo)", "WORD(hi)"])]
fn lexer_barewords(#[case] input: &str, #[case] expected: &[&str]) {
    run_lexer_test(input, expected);
}

// =============================================================================
// Variables
// =============================================================================

#[rstest]
#[case::var_simple("$x", &["VAR(x)"])]
#[case::var_hyphen("$foo-bar", &["VAR(foo-bar)"])]
#[case::var_underscore("$_x1", &["VAR(_x1)"])]
#[case::var_then_index("$l[0]", &["VAR(l)", "INDEX", "WORD(0)", "RBRACKET"])]
#[case::spaced_bracket_is_list("$l [0]", &["VAR(l)", "LBRACKET", "WORD(0)", "RBRACKET"])]
#[case::capture_then_index("(f)[1]", &["LPAREN", "WORD(f)", "RPAREN", "INDEX", "WORD(1)", "RBRACKET"])]
fn lexer_variables(#[case] input: &str, #[case] expected: &[&str]) {
    run_lexer_test(input, expected);
}

// =============================================================================
// Strings
// =============================================================================

#[rstest]
#[case::single_plain("'hello world'", &["STR(hello world)"])]
#[case::single_doubled_quote("'it''s'", &["STR(it's)"])]
#[case::single_no_escapes("'a\\nb'", &["STR(a\\nb)"])]
#[case::double_plain("\"hi\"", &["STR(hi)"])]
#[case::double_tab("\"a\\tb\"", &["STR(a\\tb)"])]
#[case::double_dollar("\"\\$x\"", &["STR($x)"])]
#[case::double_quote("\"say \\\"hi\\\"\"", &["STR(say \"hi\")"])]
#[case::empty_single("''", &["STR()"])]
fn lexer_strings(#[case] input: &str, #[case] expected: &[&str]) {
    run_lexer_test(input, expected);
}

#[rstest]
#[case::unterminated_single("'abc")]
#[case::unterminated_double("\"abc")]
fn lexer_string_errors(#[case] input: &str) {
    run_lexer_error_test(input);
}

// =============================================================================
// Operators and structure
// =============================================================================

#[rstest]
#[case::pipe("a | b", &["WORD(a)", "PIPE", "WORD(b)"])]
#[case::pipe_tight("a|b", &["WORD(a)", "PIPE", "WORD(b)"])]
#[case::background("a &", &["WORD(a)", "AMP"])]
#[case::semicolon("a; b", &["WORD(a)", "SEMI", "WORD(b)"])]
#[case::newline("a\nb", &["WORD(a)", "NEWLINE", "WORD(b)"])]
#[case::assign("var x = 1", &["WORD(var)", "WORD(x)", "EQ", "WORD(1)"])]
#[case::capture("(echo)", &["LPAREN", "WORD(echo)", "RPAREN"])]
#[case::list("[a b]", &["LBRACKET", "WORD(a)", "WORD(b)", "RBRACKET"])]
fn lexer_operators(#[case] input: &str, #[case] expected: &[&str]) {
    run_lexer_test(input, expected);
}

// =============================================================================
// Redirections
// =============================================================================

#[rstest]
#[case::write(">", &["REDIR(>)"])]
#[case::read("<", &["REDIR(<)"])]
#[case::append(">>", &["REDIR(>>)"])]
#[case::read_write("<>", &["REDIR(<>)"])]
#[case::fd_write("2>", &["REDIR(2>)"])]
#[case::fd_read("3<", &["REDIR(3<)"])]
#[case::dup("2>&1", &["REDIR(2>&1)"])]
#[case::close(">&-", &["REDIR(>&-)"])]
#[case::with_target("echo hi >out", &["WORD(echo)", "WORD(hi)", "REDIR(>)", "WORD(out)"])]
fn lexer_redirections(#[case] input: &str, #[case] expected: &[&str]) {
    run_lexer_test(input, expected);
}

// =============================================================================
// Skipped input
// =============================================================================

#[rstest]
#[case::comment("echo # ignored", &["WORD(echo)"])]
#[case::comment_keeps_newline("a # c\nb", &["WORD(a)", "NEWLINE", "WORD(b)"])]
#[case::line_continuation("a \\\nb", &["WORD(a)", "WORD(b)"])]
#[case::blank("   \t ", &[])]
fn lexer_skipped(#[case] input: &str, #[case] expected: &[&str]) {
    run_lexer_test(input, expected);
}

#[rstest]
#[case::brace("echo {")]
#[case::bang("echo !")]
#[case::lone_dollar("echo $")]
fn lexer_unexpected_characters(#[case] input: &str) {
    run_lexer_error_test(input);
}

#[test]
fn error_reports_offset() {
    let err = tokenize("echo {").unwrap_err();
    assert_eq!(err.pos, 5);
}
