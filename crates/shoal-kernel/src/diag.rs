//! Source-located diagnostics.
//!
//! A `ContextualError` pins a message to a byte offset in a named source
//! text. Rendering looks like:
//!
//! ```text
//! script.sh:2:6: command not found: frob
//! echo (frob x)
//!       ^
//! ```

use std::fmt;
use std::sync::Arc;

use crate::ast::Pos;

/// An error attributed to a position in a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextualError {
    /// Name of the source (file name, `-c`, `[repl]`).
    pub name: String,
    /// Full source text; shared with the evaluator that raised the error.
    pub text: Arc<str>,
    /// Byte offset of the offending node.
    pub pos: Pos,
    pub message: String,
}

impl ContextualError {
    pub fn new(
        name: impl Into<String>,
        text: Arc<str>,
        pos: Pos,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            text,
            pos,
            message: message.into(),
        }
    }

    /// 1-based line of `pos`.
    pub fn line(&self) -> usize {
        let pos = self.clamped_pos();
        self.text[..pos].matches('\n').count() + 1
    }

    /// 1-based column of `pos`, counted in characters.
    pub fn column(&self) -> usize {
        let pos = self.clamped_pos();
        let line_start = self.text[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
        self.text[line_start..pos].chars().count() + 1
    }

    /// The source line containing `pos`, without its newline.
    pub fn source_line(&self) -> &str {
        let pos = self.clamped_pos();
        let start = self.text[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let end = self.text[pos..]
            .find('\n')
            .map(|i| pos + i)
            .unwrap_or(self.text.len());
        &self.text[start..end]
    }

    // Positions past the end (EOF errors) or inside a multi-byte char are
    // pulled back to the nearest valid boundary.
    fn clamped_pos(&self) -> usize {
        let mut pos = self.pos.min(self.text.len());
        while !self.text.is_char_boundary(pos) {
            pos -= 1;
        }
        pos
    }
}

impl fmt::Display for ContextualError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let column = self.column();
        write!(f, "{}:{}:{}: {}", self.name, self.line(), column, self.message)?;
        let line = self.source_line();
        if !line.is_empty() {
            write!(f, "\n{}\n{:>width$}", line, "^", width = column)?;
        }
        Ok(())
    }
}

impl std::error::Error for ContextualError {}
