//! Rego back end for the SEAL compiler.
//!
//! Translates parsed policies into a Rego module: one rule per flat
//! statement, context statements linearised by Cartesian product,
//! obligation conditions extracted into a module-level list, and the whole
//! module passed through a bracket-stack pretty-printer. The back end is
//! textual; tests pin exact output.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod compiler;
mod linearize;
mod prettify;

pub use compiler::{RegoCompiler, COMPILED_REGO_HELPERS, LANGUAGE};

use seal_backend::{CompileError, Compiler};
use std::sync::Once;

fn construct() -> Result<Box<dyn Compiler>, CompileError> {
    Ok(Box::new(RegoCompiler::new()))
}

/// Register this back end under the name `rego`.
///
/// Safe to call more than once; only the first call registers.
pub fn register() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| seal_backend::register(LANGUAGE, construct));
}
