//! Error types for the SPF frontend.
//!
//! This module defines all error types used throughout the crate, organized
//! by the phase that produces them. Every extraction-phase error is fatal to
//! the enclosing run; there is no local recovery.

use crate::utils::location::Span;
use std::fmt;
use thiserror::Error;

/// Top-level error type for the frontend.
#[derive(Error, Debug)]
pub enum SpfError {
    /// Error during lexing/tokenization
    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),

    /// Error during parsing
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error during polyhedral extraction
    #[error("{0}")]
    Extract(#[from] ExtractError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error during lexical analysis.
#[derive(Error, Debug, Clone)]
pub struct LexerError {
    /// The error message
    pub message: String,
    /// Location in source
    pub span: Span,
    /// The kind of lexer error
    pub kind: LexerErrorKind,
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

/// The kind of a lexer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerErrorKind {
    /// Unexpected character
    UnexpectedChar,
    /// Invalid number literal
    InvalidNumber,
    /// Unexpected end of file
    UnexpectedEof,
}

/// Error during parsing.
#[derive(Error, Debug, Clone)]
pub struct ParseError {
    /// The error message
    pub message: String,
    /// Location in source
    pub span: Span,
    /// The kind of parse error
    pub kind: ParseErrorKind,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

/// The kind of a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Unexpected token
    UnexpectedToken,
    /// Expected a specific token
    ExpectedToken,
    /// Expected an expression
    ExpectedExpression,
    /// Expected a statement
    ExpectedStatement,
    /// Expected a type name
    ExpectedType,
    /// Construct the frontend does not model at all (switch, goto, labels)
    UnsupportedConstruct,
    /// Unexpected end of file
    UnexpectedEof,
}

/// Fatal error raised while extracting the polyhedral model.
///
/// Carries the span and source snippet of the offending statement so the
/// driver can report them after the `ERROR:` line.
#[derive(Error, Debug, Clone)]
pub struct ExtractError {
    /// The error message
    pub message: String,
    /// The kind of extraction error
    pub kind: ExtractErrorKind,
    /// Location of the offending construct, if known
    pub span: Option<Span>,
    /// Source text of the offending statement, if known
    pub snippet: Option<String>,
}

impl ExtractError {
    /// Create a new extraction error with no location attached.
    pub fn new(kind: ExtractErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            span: None,
            snippet: None,
        }
    }

    /// Attach the span of the offending construct.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach the source text of the offending statement.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// The category of a fatal extraction error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractErrorKind {
    /// Statement or expression shape the extractor does not accept
    UnsupportedConstruct,
    /// Missing or invalid for-loop initializer, condition, or increment
    MalformedFor,
    /// Loop-invariant modification, re-declaration, or disequality constraint
    SemanticViolation,
    /// Subscript chain deeper than the maximum array rank
    CapacityExceeded,
    /// Callee definition not found, or too many values returned from a splice
    Resolution,
    /// Internal consistency check failed; indicates a bug
    Inconsistent,
}

/// Result type using SpfError.
pub type SpfResult<T> = Result<T, SpfError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::location::SourceLocation;

    #[test]
    fn test_extract_error_display() {
        let err = ExtractError::new(
            ExtractErrorKind::MalformedFor,
            "Invalid increment in for loop -- must increase iterator by 1",
        );
        assert_eq!(
            err.to_string(),
            "Invalid increment in for loop -- must increase iterator by 1"
        );
    }

    #[test]
    fn test_extract_error_span() {
        let span = Span::from_locations(
            SourceLocation::new(3, 5, 20),
            SourceLocation::new(3, 10, 25),
        );
        let err = ExtractError::new(ExtractErrorKind::SemanticViolation, "oops")
            .with_span(span)
            .with_snippet("n = 0;");
        assert_eq!(err.span.unwrap().start_line, 3);
        assert_eq!(err.snippet.as_deref(), Some("n = 0;"));
    }
}
