//! Lexer for shoal source code.
//!
//! Converts source text into a stream of tokens using the logos lexer
//! generator. Whitespace, comments (`# ...`) and escaped newlines are
//! skipped; bare newlines are significant because they end pipelines.
//!
//! A `[` written directly against the end of a term (`$l[0]`, `(cmd)[1]`)
//! is indexing, not the start of a list. Logos cannot look behind, so
//! [`tokenize`] rewrites those brackets to [`Token::Index`].

use std::fmt;
use std::ops::Range;

use logos::{Lexer, Logos};

/// Redirection operator, with the optional port index written before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirToken {
    pub fd: Option<usize>,
    pub op: RedirOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirOp {
    /// `<`
    Read,
    /// `>`
    Write,
    /// `>>`
    Append,
    /// `<>`
    ReadWrite,
    /// `>&N`
    Dup(usize),
    /// `>&-`
    Close,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"\\\r?\n")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    #[token("\n")]
    Newline,
    #[token(";")]
    Semi,
    #[token("|")]
    Pipe,
    #[token("&")]
    Amp,
    #[token("=")]
    Eq,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    /// `[` directly after a term. Produced by [`tokenize`], not by a rule.
    Index,

    #[regex(r"[0-9]*(<|>|>>|<>|>&-|>&[0-9]+)", lex_redir)]
    Redir(RedirToken),

    #[regex(r"\$[A-Za-z_][A-Za-z0-9_-]*", |lex| lex.slice()[1..].to_string())]
    Variable(String),

    #[regex(r"'([^']|'')*'", lex_single_quoted)]
    SingleQuoted(String),

    #[regex(r#""([^"\\]|\\.)*""#, lex_double_quoted)]
    DoubleQuoted(String),

    #[regex(r"[A-Za-z0-9_./:@%+,^~*-]+", |lex| lex.slice().to_string())]
    Bareword(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Newline => f.write_str("newline"),
            Token::Semi => f.write_str("';'"),
            Token::Pipe => f.write_str("'|'"),
            Token::Amp => f.write_str("'&'"),
            Token::Eq => f.write_str("'='"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::Index => f.write_str("'['"),
            Token::Redir(_) => f.write_str("redirection"),
            Token::Variable(name) => write!(f, "${name}"),
            Token::SingleQuoted(_) | Token::DoubleQuoted(_) => f.write_str("quoted string"),
            Token::Bareword(word) => write!(f, "'{word}'"),
        }
    }
}

fn lex_redir(lex: &mut Lexer<Token>) -> Option<RedirToken> {
    let slice = lex.slice();
    let digits_end = slice
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(slice.len());
    // Out-of-range numbers saturate; the parser rejects them with a position.
    let fd = if digits_end == 0 {
        None
    } else {
        Some(slice[..digits_end].parse().unwrap_or(usize::MAX))
    };
    let op = match &slice[digits_end..] {
        "<" => RedirOp::Read,
        ">" => RedirOp::Write,
        ">>" => RedirOp::Append,
        "<>" => RedirOp::ReadWrite,
        ">&-" => RedirOp::Close,
        rest => RedirOp::Dup(rest.strip_prefix(">&")?.parse().unwrap_or(usize::MAX)),
    };
    Some(RedirToken { fd, op })
}

fn lex_single_quoted(lex: &mut Lexer<Token>) -> String {
    let slice = lex.slice();
    slice[1..slice.len() - 1].replace("''", "'")
}

fn lex_double_quoted(lex: &mut Lexer<Token>) -> String {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(c @ ('\\' | '"' | '$')) => out.push(c),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// A token and the byte range it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Range<usize>,
}

/// Input the lexer could not turn into a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub pos: usize,
    pub message: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.pos)
    }
}

impl std::error::Error for LexError {}

/// Whether a token can be the last token of a term.
fn ends_term(token: &Token) -> bool {
    matches!(
        token,
        Token::Bareword(_)
            | Token::SingleQuoted(_)
            | Token::DoubleQuoted(_)
            | Token::Variable(_)
            | Token::RParen
            | Token::RBracket
    )
}

/// Tokenize a whole source text.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, LexError> {
    let mut lexer = Token::lexer(source);
    let mut tokens: Vec<Spanned> = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(Token::LBracket)
                if tokens
                    .last()
                    .is_some_and(|prev| prev.span.end == span.start && ends_term(&prev.token)) =>
            {
                tokens.push(Spanned {
                    token: Token::Index,
                    span,
                })
            }
            Ok(token) => tokens.push(Spanned { token, span }),
            Err(()) => {
                let found = &source[span.clone()];
                let message = match found.chars().next() {
                    Some('\'') | Some('"') => "unterminated string".to_string(),
                    Some(c) => format!("unexpected character {c:?}"),
                    None => "unexpected end of input".to_string(),
                };
                return Err(LexError {
                    pos: span.start,
                    message,
                });
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn spans_cover_source() {
        let tokens = tokenize("echo $x").unwrap();
        assert_eq!(tokens[0].span, 0..4);
        assert_eq!(tokens[1].span, 5..7);
    }

    #[test]
    fn fd_prefix_binds_to_redirection() {
        assert_eq!(
            kinds("2>err"),
            vec![
                Token::Redir(RedirToken {
                    fd: Some(2),
                    op: RedirOp::Write
                }),
                Token::Bareword("err".into()),
            ]
        );
    }

    #[test]
    fn escaped_newline_is_skipped() {
        assert_eq!(
            kinds("echo \\\n hi"),
            vec![Token::Bareword("echo".into()), Token::Bareword("hi".into())]
        );
    }

    #[test]
    fn adjacent_bracket_is_index() {
        assert_eq!(
            kinds("$l[0] [1]"),
            vec![
                Token::Variable("l".into()),
                Token::Index,
                Token::Bareword("0".into()),
                Token::RBracket,
                Token::LBracket,
                Token::Bareword("1".into()),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn huge_port_numbers_saturate() {
        assert_eq!(
            kinds("99999999999999999999999>&1"),
            vec![Token::Redir(RedirToken {
                fd: Some(usize::MAX),
                op: RedirOp::Dup(1)
            })]
        );
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let err = tokenize("echo 'abc").unwrap_err();
        assert_eq!(err.pos, 5);
        assert_eq!(err.message, "unterminated string");
    }
}
