//! Abstract syntax tree for shoal source code.
//!
//! Every node records the byte offset where it starts in the source text.
//! The compiler copies those offsets into the operations it builds so the
//! evaluator can attribute runtime errors to a source position.

/// Byte offset into the source text.
pub type Pos = usize;

/// Port indices run from 0 to `MAX_PORTS - 1`.
pub const MAX_PORTS: usize = 1024;

/// Anything that occupies a position in the source.
pub trait Node {
    fn pos(&self) -> Pos;

    /// Short label for diagnostics and tracing ("pipeline", "form", ...).
    fn kind_name(&self) -> &'static str;

    /// Cheap reference to this node for the evaluator's diagnostic stack.
    fn mark(&self) -> NodeMark {
        NodeMark {
            pos: self.pos(),
            kind: self.kind_name(),
        }
    }
}

/// What the diagnostic stack records about a node: where it is and what it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeMark {
    pub pos: Pos,
    pub kind: &'static str,
}

/// A whole program, or the body of an output capture.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub pos: Pos,
    pub pipelines: Vec<Pipeline>,
}

/// Forms connected by `|`, optionally run in the background with `&`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub pos: Pos,
    pub forms: Vec<Form>,
    pub background: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub pos: Pos,
    pub kind: FormKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormKind {
    /// `head arg... redir...`
    Command {
        head: Term,
        args: Vec<Term>,
        redirs: Vec<Redir>,
    },
    /// `var NAME = value` (declare) or `set NAME = value` (assign).
    Assign {
        declare: bool,
        name: String,
        name_pos: Pos,
        values: Vec<Term>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub pos: Pos,
    pub kind: TermKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TermKind {
    Bareword(String),
    /// Single- or double-quoted string, escapes already processed.
    Quoted(String),
    /// `$name`
    Variable(String),
    /// `(chunk)`: the chunk's output, as one string.
    Capture(Chunk),
    /// `[a b c]`
    List(Vec<Term>),
    /// `base[index]`
    Index { base: Box<Term>, index: Box<Term> },
}

/// An I/O redirection attached to a command form.
#[derive(Debug, Clone, PartialEq)]
pub struct Redir {
    pub pos: Pos,
    /// Port index being redirected.
    pub fd: usize,
    pub kind: RedirKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirKind {
    /// `N< file`, `N> file`, `N>> file`, `N<> file`
    File { mode: RedirMode, target: Term },
    /// `N>&M`: port N becomes a copy of port M.
    Dup(usize),
    /// `N>&-`
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirMode {
    Read,
    Write,
    Append,
    ReadWrite,
}

impl RedirMode {
    /// Port a redirection applies to when no index is written.
    pub fn default_fd(self) -> usize {
        match self {
            RedirMode::Read | RedirMode::ReadWrite => 0,
            RedirMode::Write | RedirMode::Append => 1,
        }
    }
}

impl Chunk {
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

impl Node for Chunk {
    fn pos(&self) -> Pos {
        self.pos
    }
    fn kind_name(&self) -> &'static str {
        "chunk"
    }
}

impl Node for Pipeline {
    fn pos(&self) -> Pos {
        self.pos
    }
    fn kind_name(&self) -> &'static str {
        "pipeline"
    }
}

impl Node for Form {
    fn pos(&self) -> Pos {
        self.pos
    }
    fn kind_name(&self) -> &'static str {
        "form"
    }
}

impl Node for Term {
    fn pos(&self) -> Pos {
        self.pos
    }
    fn kind_name(&self) -> &'static str {
        match self.kind {
            TermKind::Bareword(_) | TermKind::Quoted(_) => "string",
            TermKind::Variable(_) => "variable",
            TermKind::Capture(_) => "capture",
            TermKind::List(_) => "list",
            TermKind::Index { .. } => "index",
        }
    }
}

impl Node for Redir {
    fn pos(&self) -> Pos {
        self.pos
    }
    fn kind_name(&self) -> &'static str {
        "redirection"
    }
}
