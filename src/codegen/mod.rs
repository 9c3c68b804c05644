//! Code generation from the extracted IR.

pub mod c;

pub use c::CCodeGen;

use crate::ir::Computation;
use anyhow::Result;

/// Generate C code for a computation.
pub fn generate(comp: &Computation) -> Result<String> {
    CCodeGen::new().generate(comp)
}
