//! Frontend: lexer, parser, and AST for the C subset.
//!
//! This module is the AST provider for the extractor. The input language is
//! restricted C: function definitions with scalar and array parameters,
//! `for`/`if` control flow, scalar and array assignments, calls, and returns.
//!
//! ```text
//! void matrix_add(int a, int b, int x[a][b], int y[a][b], int sum[a][b]) {
//!     int i;
//!     int j;
//!     for (i = 0; i < a; i++) {
//!         for (j = 0; j < b; j++) {
//!             sum[i][j] = x[i][j] + y[i][j];
//!         }
//!     }
//! }
//! ```

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::*;
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Token, TokenKind};

use crate::utils::errors::SpfResult;

/// Parse source code into an AST.
pub fn parse(source: &str) -> SpfResult<ast::Program> {
    let lexer = Lexer::new(source);
    let mut parser = Parser::new(lexer)?;
    Ok(parser.parse_program()?)
}
