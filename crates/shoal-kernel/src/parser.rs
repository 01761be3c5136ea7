//! Parser for shoal source code.
//!
//! Transforms the lexer's token stream into a [`Chunk`] using chumsky
//! combinators over [`Token`].
//!
//! ```text
//! chunk     := { pipeline (NEWLINE | ';') }
//! pipeline  := form { '|' form } [ '&' ]
//! form      := 'var' NAME '=' term+ | 'set' NAME '=' term+ | term { term | redir }
//! term      := primary { INDEX term ']' }
//! primary   := BAREWORD | QUOTED | $NAME | '(' chunk ')' | '[' { term } ']'
//! redir     := [FD] ('<' | '>' | '>>' | '<>') term | [FD] '>&' FD | [FD] '>&-'
//! ```
//!
//! Newlines inside `(...)` and `[...]` are treated as separators, so a
//! capture can span several lines.

use std::sync::Arc;

use chumsky::{error::RichPattern, error::RichReason, input::ValueInput, prelude::*};

use crate::ast::{
    Chunk, Form, FormKind, Pipeline, Redir, RedirKind, RedirMode, Term, TermKind, MAX_PORTS,
};
use crate::diag::ContextualError;
use crate::lexer::{self, RedirOp, RedirToken, Token};

/// Span type used throughout the parser.
pub type Span = SimpleSpan;

type Extra<'tokens> = extra::Err<Rich<'tokens, Token, Span>>;

/// Parse a full source text into a chunk.
///
/// `name` only labels the error when parsing fails. Only the earliest
/// error is reported.
pub fn parse(name: &str, source: &str) -> Result<Chunk, ContextualError> {
    let text: Arc<str> = Arc::from(source);

    // Tokenize with logos
    let tokens = lexer::tokenize(source)
        .map_err(|e| ContextualError::new(name, text.clone(), e.pos, e.message))?;

    let tokens: Vec<(Token, Span)> = tokens
        .into_iter()
        .map(|spanned| (spanned.token, spanned.span.into()))
        .collect();

    // End-of-input span
    let end_span: Span = (source.len()..source.len()).into();

    let parser = chunk_parser().then_ignore(end());
    let result = parser.parse(tokens.as_slice().map(end_span, |(t, s)| (t, s)));

    result.into_result().map_err(|errs| {
        match errs.into_iter().min_by_key(|e| e.span().start) {
            Some(e) => ContextualError::new(name, text.clone(), e.span().start, describe(&e)),
            None => ContextualError::new(name, text.clone(), source.len(), "invalid input"),
        }
    })
}

/// Render a chumsky error as "expected X or Y, found Z".
fn describe(err: &Rich<'_, Token, Span>) -> String {
    match err.reason() {
        RichReason::ExpectedFound { expected, found } => {
            let found = found
                .as_deref()
                .map_or_else(|| "end of input".to_string(), Token::to_string);
            let mut expected: Vec<String> = expected.iter().map(pattern).collect();
            expected.sort();
            expected.dedup();
            if expected.is_empty() {
                format!("unexpected {found}")
            } else {
                format!("expected {}, found {found}", expected.join(" or "))
            }
        }
        RichReason::Custom(message) => message.clone(),
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

fn pattern(p: &RichPattern<'_, Token>) -> String {
    match p {
        RichPattern::Token(token) => (**token).to_string(),
        RichPattern::Label(label) => label.to_string(),
        RichPattern::EndOfInput => "end of input".to_string(),
        other => other.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Parser Combinators - generic over input type
// ═══════════════════════════════════════════════════════════════════════════

/// A chunk: pipelines separated by newlines or `;`. Recursive through
/// output captures.
fn chunk_parser<'tokens, I>() -> impl Parser<'tokens, I, Chunk, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
{
    recursive(|chunk| {
        let term = term_parser(chunk);
        let redir = redir_parser(term.clone());
        let pipeline = pipeline_parser(form_parser(term, redir));
        let separator = choice((just(Token::Newline), just(Token::Semi)));

        separator.clone().repeated().ignore_then(
            pipeline
                .separated_by(separator.repeated().at_least(1))
                .allow_trailing()
                .collect::<Vec<_>>()
                .map_with(|pipelines, e: &mut chumsky::input::MapExtra<'tokens, '_, I, Extra<'tokens>>| Chunk {
                    pos: e.span().start,
                    pipelines,
                }),
        )
    })
}

/// Forms joined by `|`, a newline allowed after each `|`, optional `&`.
fn pipeline_parser<'tokens, I, F>(form: F) -> impl Parser<'tokens, I, Pipeline, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    F: Parser<'tokens, I, Form, Extra<'tokens>> + Clone + 'tokens,
{
    form.separated_by(just(Token::Pipe).then(just(Token::Newline).repeated()))
        .at_least(1)
        .collect::<Vec<_>>()
        .then(just(Token::Amp).or_not())
        .map_with(|(forms, amp), e| Pipeline {
            pos: e.span().start,
            forms,
            background: amp.is_some(),
        })
}

/// Argument or redirection after a command head.
enum Part {
    Arg(Term),
    Redir(Redir),
}

/// Assignment or command. `var`/`set` only act as keywords in the
/// `var NAME = value` shape; otherwise they are ordinary command names.
fn form_parser<'tokens, I, T, R>(term: T, redir: R) -> impl Parser<'tokens, I, Form, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    T: Parser<'tokens, I, Term, Extra<'tokens>> + Clone + 'tokens,
    R: Parser<'tokens, I, Redir, Extra<'tokens>> + Clone + 'tokens,
{
    let keyword = select! {
        Token::Bareword(word) if word == "var" => true,
        Token::Bareword(word) if word == "set" => false,
    };
    let name = select! { Token::Bareword(name) => name }.map_with(|name, e: &mut chumsky::input::MapExtra<'tokens, '_, I, Extra<'tokens>>| (name, e.span().start));

    let assign = keyword
        .then(name)
        .then_ignore(just(Token::Eq))
        .then(term.clone().repeated().at_least(1).collect::<Vec<_>>())
        .map(|((declare, (name, name_pos)), values)| FormKind::Assign {
            declare,
            name,
            name_pos,
            values,
        });

    let command = term
        .clone()
        .then(
            choice((term.map(Part::Arg), redir.map(Part::Redir)))
                .repeated()
                .collect::<Vec<_>>(),
        )
        .map(|(head, parts)| {
            let mut args = Vec::new();
            let mut redirs = Vec::new();
            for part in parts {
                match part {
                    Part::Arg(term) => args.push(term),
                    Part::Redir(redir) => redirs.push(redir),
                }
            }
            FormKind::Command { head, args, redirs }
        });

    choice((assign, command))
        .map_with(|kind, e| Form {
            pos: e.span().start,
            kind,
        })
        .labelled("command")
}

/// Words, variables, captures, lists, and indexing on any of them.
fn term_parser<'tokens, I, C>(chunk: C) -> impl Parser<'tokens, I, Term, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    C: Parser<'tokens, I, Chunk, Extra<'tokens>> + Clone + 'tokens,
{
    recursive(|term| {
        let word = select! {
            Token::Bareword(word) => TermKind::Bareword(word),
            Token::SingleQuoted(s) => TermKind::Quoted(s),
            Token::DoubleQuoted(s) => TermKind::Quoted(s),
            Token::Variable(name) => TermKind::Variable(name),
        };

        let capture = chunk
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .map(TermKind::Capture);

        let newlines = just(Token::Newline).repeated();
        let list = newlines
            .clone()
            .ignore_then(term.clone())
            .repeated()
            .collect::<Vec<_>>()
            .then_ignore(newlines)
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(TermKind::List);

        let primary = choice((word, capture, list)).map_with(|kind, e| Term {
            pos: e.span().start,
            kind,
        });

        let index = term.delimited_by(just(Token::Index), just(Token::RBracket));

        primary
            .foldl(index.repeated(), |base, index| Term {
                pos: base.pos,
                kind: TermKind::Index {
                    base: Box::new(base),
                    index: Box::new(index),
                },
            })
            .labelled("term")
            .boxed()
    })
}

/// File, dup and close redirections. Port numbers past the table limit
/// are reported at the redirection.
fn redir_parser<'tokens, I, T>(term: T) -> impl Parser<'tokens, I, Redir, Extra<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = Span>,
    T: Parser<'tokens, I, Term, Extra<'tokens>> + Clone + 'tokens,
{
    let file_op = select! {
        Token::Redir(RedirToken { fd, op: RedirOp::Read }) => (fd, RedirMode::Read),
        Token::Redir(RedirToken { fd, op: RedirOp::Write }) => (fd, RedirMode::Write),
        Token::Redir(RedirToken { fd, op: RedirOp::Append }) => (fd, RedirMode::Append),
        Token::Redir(RedirToken { fd, op: RedirOp::ReadWrite }) => (fd, RedirMode::ReadWrite),
    };
    let port_op = select! {
        Token::Redir(RedirToken { fd, op: RedirOp::Dup(src) }) => (fd.unwrap_or(1), RedirKind::Dup(src)),
        Token::Redir(RedirToken { fd, op: RedirOp::Close }) => (fd.unwrap_or(1), RedirKind::Close),
    };

    let file = file_op
        .then(term.labelled("redirection target"))
        .map(|((fd, mode), target)| {
            (fd.unwrap_or(mode.default_fd()), RedirKind::File { mode, target })
        });

    choice((file, port_op))
        .map_with(|(fd, kind), e| Redir {
            pos: e.span().start,
            fd,
            kind,
        })
        .validate(|redir, e, emitter| {
            let src = match redir.kind {
                RedirKind::Dup(src) => Some(src),
                _ => None,
            };
            if let Some(port) = std::iter::once(redir.fd).chain(src).find(|&p| p >= MAX_PORTS) {
                emitter.emit(Rich::custom(
                    e.span(),
                    format!("port {port} out of range (max {})", MAX_PORTS - 1),
                ));
            }
            redir
        })
}
