//! Backend compiler contract for SEAL.
//!
//! A back end turns a parsed policy tree plus the resource-type catalogue
//! into target-language source text. Back ends register a constructor under
//! a language name; the façade looks them up by name at compile time.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod registry;

pub use error::CompileError;
pub use registry::{languages, new_compiler, register, Constructor};

use seal_lang::Policies;
use seal_schema::ResourceType;

/// A language-specific compiler back end
pub trait Compiler: Send + Sync {
    /// Compile the policy tree into target-language source.
    ///
    /// `types` is the same sorted catalogue the parser validated against.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`], usually wrapped with the failing
    /// statement's index and surface form.
    fn compile(
        &self,
        package_name: &str,
        policies: &Policies,
        types: &[ResourceType],
    ) -> Result<String, CompileError>;
}
