//! Shared utilities: source locations and error types.

pub mod errors;
pub mod location;

pub use errors::{ExtractError, ExtractErrorKind, SpfError, SpfResult};
pub use location::{SourceLocation, SourceMap, Span};
