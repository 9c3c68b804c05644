//! Source location tracking for error reporting.
//!
//! Locations and spans identify the offending token when extraction fails,
//! and spans double as the source of truth for expression-as-source-text:
//! the text of any AST node is the source slice covered by its span.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in source code (line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
    /// Byte offset from start of file
    pub offset: usize,
}

impl SourceLocation {
    /// Create a new source location.
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self { line, column, offset }
    }

    /// Create a location at the start of a file.
    pub fn start() -> Self {
        Self { line: 1, column: 1, offset: 0 }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A span in source code (start and end positions, end exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start line (1-indexed)
    pub start_line: usize,
    /// Start column (1-indexed)
    pub start_column: usize,
    /// End line (1-indexed)
    pub end_line: usize,
    /// End column (1-indexed)
    pub end_column: usize,
    /// Byte offset of start
    pub start_offset: usize,
    /// Byte offset of end
    pub end_offset: usize,
}

impl Span {
    /// Create a span from start and end locations.
    pub fn from_locations(start: SourceLocation, end: SourceLocation) -> Self {
        Self {
            start_line: start.line,
            start_column: start.column,
            end_line: end.line,
            end_column: end.column,
            start_offset: start.offset,
            end_offset: end.offset,
        }
    }

    /// Create a dummy span (for synthesized nodes).
    pub fn dummy() -> Self {
        Self::default()
    }

    /// Get the start location.
    pub fn start(&self) -> SourceLocation {
        SourceLocation {
            line: self.start_line,
            column: self.start_column,
            offset: self.start_offset,
        }
    }

    /// Get the end location.
    pub fn end(&self) -> SourceLocation {
        SourceLocation {
            line: self.end_line,
            column: self.end_column,
            offset: self.end_offset,
        }
    }

    /// Merge two spans to create a span covering both.
    pub fn merge(&self, other: &Span) -> Span {
        let start = if self.start_offset <= other.start_offset {
            self.start()
        } else {
            other.start()
        };
        let end = if self.end_offset >= other.end_offset {
            self.end()
        } else {
            other.end()
        };
        Span::from_locations(start, end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_line == self.end_line {
            write!(f, "{}:{}-{}", self.start_line, self.start_column, self.end_column)
        } else {
            write!(
                f,
                "{}:{}-{}:{}",
                self.start_line, self.start_column, self.end_line, self.end_column
            )
        }
    }
}

/// Maps byte offsets back to lines and provides span-to-text lookups.
#[derive(Debug, Clone)]
pub struct SourceMap {
    /// The source text
    source: String,
    /// Line start offsets
    line_starts: Vec<usize>,
}

impl SourceMap {
    /// Create a new source map.
    pub fn new(source: String) -> Self {
        let mut line_starts = vec![0];
        for (i, c) in source.char_indices() {
            if c == '\n' {
                line_starts.push(i + 1);
            }
        }
        Self { source, line_starts }
    }

    /// Get the source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Convert a byte offset to a source location.
    pub fn offset_to_location(&self, offset: usize) -> SourceLocation {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };
        let column = offset - self.line_starts[line] + 1;
        SourceLocation::new(line + 1, column, offset)
    }

    /// Get the exact source text for a span.
    pub fn span_text(&self, span: &Span) -> &str {
        &self.source[span.start_offset..span.end_offset]
    }

    /// Get a line of source code.
    pub fn line(&self, line_number: usize) -> Option<&str> {
        if line_number == 0 || line_number > self.line_starts.len() {
            return None;
        }
        let start = self.line_starts[line_number - 1];
        let end = self
            .line_starts
            .get(line_number)
            .copied()
            .unwrap_or(self.source.len());
        Some(self.source[start..end].trim_end_matches('\n'))
    }

    /// Get the number of lines.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}
