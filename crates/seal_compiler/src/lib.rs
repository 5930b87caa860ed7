//! SEAL policy compiler façade.
//!
//! Glues the pipeline together: merges OpenAPI schema documents, builds the
//! type catalogue, runs lexer → parser → semantic validation, and hands the
//! tree to the chosen back end. Built-in back ends are registered on first
//! use; additional ones can be registered through [`seal_backend`].

#![warn(missing_docs)]
#![warn(clippy::all)]

use seal_backend::{CompileError, Compiler};
use seal_lang::{Lexer, Parser};
use seal_schema::{ResourceType, SchemaError};
use thiserror::Error;

pub use seal_backend::languages;

/// Error from the policy-compiler façade
#[derive(Debug, Error)]
pub enum PolicyError {
    /// No schema documents were supplied
    #[error("swagger is required for inferring types")]
    MissingSchemas,

    /// The requested back end could not be constructed
    #[error("unable to create backend compiler: {0}")]
    Backend(CompileError),

    /// The schema documents did not produce a catalogue
    #[error("Swagger error: {0}")]
    Schema(#[from] SchemaError),

    /// Collected parse diagnostics, joined by newline
    #[error("{0}")]
    Parse(String),

    /// The back end rejected the policy tree
    #[error("could not compile package {package}: {source}")]
    Compile {
        /// Package being compiled
        package: String,
        /// Underlying back-end error
        source: CompileError,
    },
}

/// Compiles SEAL policy source against a fixed schema set and back end.
///
/// Schemas are merged and catalogued once at construction; each
/// [`compile`](Self::compile) call is then self-contained, so concurrent
/// compiles on separate instances share no mutable state.
pub struct PolicyCompiler {
    backend: Box<dyn Compiler>,
    types: Vec<ResourceType>,
}

impl PolicyCompiler {
    /// Create a compiler for `backend` over the given schema documents.
    ///
    /// Later documents override earlier ones per schema key.
    ///
    /// # Errors
    ///
    /// Fails when no schemas are given, the backend name is unknown, or the
    /// catalogue cannot be built.
    pub fn new(backend: &str, schemas: &[&str]) -> Result<Self, PolicyError> {
        seal_rego::register();

        if schemas.is_empty() {
            return Err(PolicyError::MissingSchemas);
        }

        let backend = seal_backend::new_compiler(backend).map_err(PolicyError::Backend)?;
        let types = seal_schema::types_from_openapi_docs(schemas)?;
        tracing::debug!(types = types.len(), "built type catalogue");

        Ok(Self { backend, types })
    }

    /// The catalogued resource types, sorted by `group.name`
    #[must_use]
    pub fn types(&self) -> &[ResourceType] {
        &self.types
    }

    /// Compile policy source into the back end's target language.
    ///
    /// # Errors
    ///
    /// Returns the joined parser diagnostics when the source is malformed,
    /// or the back end's structured error on generation failure.
    pub fn compile(&self, package_name: &str, source: &str) -> Result<String, PolicyError> {
        let mut parser = Parser::new(Lexer::new(source), self.types.clone());
        let policies = parser.parse_policies();

        if !parser.errors().is_empty() {
            return Err(PolicyError::Parse(parser.errors().join("\n")));
        }

        self.backend
            .compile(package_name, &policies, &self.types)
            .map_err(|source| PolicyError::Compile {
                package: package_name.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
openapi: "3.0.0"
components:
  schemas:
    allow:
      type: object
      properties:
        log:
          type: boolean
      x-seal-type: action
    petstore.pet:
      type: object
      x-seal-actions:
      - allow
      x-seal-verbs:
        manage: [ "create", "delete" ]
      x-seal-default-action: deny
      properties:
        id:
          type: string
"#;

    #[test]
    fn test_requires_schemas() {
        let err = PolicyCompiler::new("rego", &[]).map(|_| ()).unwrap_err();
        assert_eq!(err.to_string(), "swagger is required for inferring types");
    }

    #[test]
    fn test_unknown_backend() {
        let err = PolicyCompiler::new("doesnotexist", &[MINIMAL])
            .map(|_| ())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to create backend compiler: invalid compiler language: doesnotexist"
        );
    }

    #[test]
    fn test_blank_swagger() {
        let err = PolicyCompiler::new("rego", &[" "]).map(|_| ()).unwrap_err();
        assert_eq!(err.to_string(), "Swagger error: no schemas found");
    }

    #[test]
    fn test_parse_diagnostics_are_joined() {
        let compiler = PolicyCompiler::new("rego", &[MINIMAL]).unwrap();
        let err = compiler
            .compile("pkg", "allow to inspect fake;")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected next token to be TYPE_PATTERN, got IDENT instead\n\
             expected next token to be to, got ; instead"
        );
    }

    #[test]
    fn test_empty_source_is_empty_policies() {
        let compiler = PolicyCompiler::new("rego", &[MINIMAL]).unwrap();
        let err = compiler.compile("pkg", "").unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not compile package pkg: invalid empty policies"
        );
    }

    #[test]
    fn test_rego_is_registered() {
        let _ = PolicyCompiler::new("rego", &[MINIMAL]).unwrap();
        assert!(languages().contains(&"rego".to_string()));
    }
}
