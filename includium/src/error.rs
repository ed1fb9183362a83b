//! The crate's single error type.
//!
//! `PreprocessError` covers every error kind named in the design's
//! taxonomy (lexical, syntactic, semantic, evaluator, include I/O,
//! resource) and carries as much location context as was available at
//! the point of failure: a filename, a line, and optionally a column
//! and the offending source line for a caret-style rendering.

use std::fmt;

/// Broad classification of a [`PreprocessError`], matching the design's
/// error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessErrorKind {
    /// Incomplete comment, bad characters.
    Lexical,
    /// Invalid directive, unmatched `)`, unterminated macro argument list.
    Syntactic,
    /// Macro redefinition, `defined` without an identifier, wrong arity.
    Semantic,
    /// Invalid constant expression, RPN stack misuse.
    Evaluator,
    /// The include-open callback failed or returned nothing.
    IncludeIo,
    /// Allocation failure / resource exhaustion.
    Resource,
}

/// An error raised while preprocessing, with as much location context
/// as was available when it was staged.
#[derive(Debug, Clone)]
pub struct PreprocessError {
    kind: PreprocessErrorKind,
    message: String,
    file: Option<String>,
    line: Option<usize>,
    column: Option<usize>,
    source_line: Option<String>,
}

impl PreprocessError {
    fn new(kind: PreprocessErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            file: None,
            line: None,
            column: None,
            source_line: None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> PreprocessErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    #[must_use]
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    #[must_use]
    pub fn column(&self) -> Option<usize> {
        self.column
    }

    /// Attach the file the error occurred in.
    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Attach the 1-based line the error occurred on.
    #[must_use]
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Attach a 1-based column for a caret-style rendering.
    #[must_use]
    pub fn with_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }

    /// Attach the literal source line text the error occurred on, so
    /// `Display` can render a caret underneath the offending column.
    #[must_use]
    pub fn with_source_line(mut self, source_line: impl Into<String>) -> Self {
        self.source_line = Some(source_line.into());
        self
    }

    // --- Constructors, one per directive/stage that can fail. ---

    #[must_use]
    pub fn malformed_directive(message: impl Into<String>) -> Self {
        Self::new(PreprocessErrorKind::Syntactic, message)
    }

    #[must_use]
    pub fn directive_error(message: impl Into<String>) -> Self {
        Self::new(PreprocessErrorKind::Syntactic, message)
    }

    #[must_use]
    pub fn conditional_error(message: impl Into<String>) -> Self {
        Self::new(PreprocessErrorKind::Semantic, message)
    }

    #[must_use]
    pub fn macro_arg_mismatch(name: &str, got: usize, expected: usize) -> Self {
        Self::new(
            PreprocessErrorKind::Semantic,
            format!("macro '{name}' passed {got} arguments, but requires {expected}"),
        )
    }

    #[must_use]
    pub fn recursion_limit_exceeded() -> Self {
        Self::new(PreprocessErrorKind::Semantic, "Recursing macros")
    }

    #[must_use]
    pub fn already_defined(name: &str) -> Self {
        Self::new(PreprocessErrorKind::Semantic, format!("'{name}' already defined"))
    }

    #[must_use]
    pub fn paste_at_boundary() -> Self {
        Self::new(PreprocessErrorKind::Semantic, "'##' cannot appear at either end of a macro expansion")
    }

    #[must_use]
    pub fn evaluator_error(message: impl Into<String>) -> Self {
        Self::new(PreprocessErrorKind::Evaluator, message)
    }

    #[must_use]
    pub fn include_not_found(filename: &str) -> Self {
        Self::new(PreprocessErrorKind::IncludeIo, format!("cannot open include file: {filename}"))
    }

    #[must_use]
    pub fn io_error(err: &std::io::Error) -> Self {
        Self::new(PreprocessErrorKind::IncludeIo, format!("I/O error: {err}"))
    }

    #[must_use]
    pub fn out_of_memory() -> Self {
        Self::new(PreprocessErrorKind::Resource, "Out of memory")
    }

    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(PreprocessErrorKind::Semantic, message)
    }

    #[must_use]
    pub fn generic_error(message: impl Into<String>) -> Self {
        Self::other(message)
    }
}

impl fmt::Display for PreprocessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => {
                if let Some(column) = self.column {
                    write!(f, "{file}:{line}:{column}: error: {}", self.message)?;
                } else {
                    write!(f, "{file}:{line}: error: {}", self.message)?;
                }
            }
            (Some(file), None) => write!(f, "{file}: error: {}", self.message)?,
            (None, _) => write!(f, "error: {}", self.message)?,
        }
        if let Some(source_line) = &self.source_line {
            write!(f, "\n    {source_line}")?;
            if let Some(column) = self.column {
                write!(f, "\n    {}^", " ".repeat(column.saturating_sub(1)))?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for PreprocessError {}

impl From<std::io::Error> for PreprocessError {
    fn from(err: std::io::Error) -> Self {
        PreprocessError::io_error(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_location() {
        let err = PreprocessError::other("boom");
        assert_eq!(err.to_string(), "error: boom");
    }

    #[test]
    fn display_with_file_and_line() {
        let err = PreprocessError::malformed_directive("bad directive").with_file("a.c").with_line(3);
        assert_eq!(err.to_string(), "a.c:3: error: bad directive");
    }

    #[test]
    fn display_with_caret() {
        let err = PreprocessError::other("oops")
            .with_file("a.c")
            .with_line(1)
            .with_column(5)
            .with_source_line("int x = y;");
        let rendered = err.to_string();
        assert!(rendered.contains("a.c:1:5: error: oops"));
        assert!(rendered.contains("int x = y;"));
        assert!(rendered.ends_with('^'));
    }

    #[test]
    fn macro_arg_mismatch_message() {
        let err = PreprocessError::macro_arg_mismatch("FOO", 1, 2);
        assert_eq!(err.message(), "macro 'FOO' passed 1 arguments, but requires 2");
        assert_eq!(err.kind(), PreprocessErrorKind::Semantic);
    }

    #[test]
    fn paste_at_boundary_message() {
        let err = PreprocessError::paste_at_boundary();
        assert_eq!(err.message(), "'##' cannot appear at either end of a macro expansion");
        assert_eq!(err.kind(), PreprocessErrorKind::Semantic);
    }

    #[test]
    fn io_error_round_trips() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: PreprocessError = io_err.into();
        assert_eq!(err.kind(), PreprocessErrorKind::IncludeIo);
    }
}
