//! The polyhedral IR produced by the extractor.
//!
//! [`Computation`] and [`Stmt`] hold the symbolic strings the extractor
//! emits; [`notation`] owns parsing and rendering of that notation.

pub mod computation;
pub mod notation;

pub use computation::{AppendResult, Computation, Stmt};
