//! # spf-extract - Sparse Polyhedral Framework frontend
//!
//! A source-to-IR frontend that turns a restricted C subset into the
//! symbolic polyhedral form consumed by sparse polyhedral tooling: for each
//! executable statement, its iteration-space set, execution-schedule
//! relation, and per-access read/write relations.
//!
//! ## Architecture
//!
//! ```text
//! Input → Frontend (lexer/parser/AST) → Extractor → Computation IR → CodeGen
//! ```
//!
//! ## Example
//!
//! ```rust
//! let source = r#"
//!     void matrix_add(int a, int b, int x[a][b], int y[a][b], int sum[a][b]) {
//!         int i;
//!         int j;
//!         for (i = 0; i < a; i++) {
//!             for (j = 0; j < b; j++) {
//!                 sum[i][j] = x[i][j] + y[i][j];
//!             }
//!         }
//!     }
//! "#;
//!
//! let comp = spf_extract::extract_function(source, "matrix_add").unwrap();
//! let stmt = comp.statements().last().unwrap();
//! assert_eq!(stmt.iteration_space(), "{[i,j]: 0<=i and i<a and 0<=j and j<b}");
//! assert_eq!(stmt.execution_schedule(), "{[i,j]->[2,i,0,j,0]}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codegen;
pub mod extract;
pub mod frontend;
pub mod ir;
pub mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::extract::{Extractor, PositionContext};
    pub use crate::frontend::ast::*;
    pub use crate::frontend::parse;
    pub use crate::ir::{AppendResult, Computation, Stmt};
    pub use crate::utils::errors::*;
    pub use crate::utils::location::{SourceMap, Span};
}

use utils::errors::SpfResult;
use utils::location::SourceMap;

/// Parse source code into an AST.
pub fn parse(source: &str) -> SpfResult<frontend::ast::Program> {
    frontend::parse(source)
}

/// Parse source code and extract the computation for one function.
pub fn extract_function(source: &str, entry_point: &str) -> SpfResult<ir::Computation> {
    let program = frontend::parse(source)?;
    let map = SourceMap::new(source.to_string());
    let mut extractor = extract::Extractor::new(&program, &map);
    Ok(extractor.extract(entry_point)?)
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
