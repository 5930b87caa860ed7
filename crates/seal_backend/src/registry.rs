//! Process-wide registry of backend compiler constructors.
//!
//! Registration happens during process initialisation; lookups happen on
//! every compile, so the map sits behind a reader/writer lock.

use crate::error::CompileError;
use crate::Compiler;
use std::collections::BTreeMap;
use std::sync::{OnceLock, RwLock};

/// Constructor for a backend compiler
pub type Constructor = fn() -> Result<Box<dyn Compiler>, CompileError>;

fn constructors() -> &'static RwLock<BTreeMap<String, Constructor>> {
    static CONSTRUCTORS: OnceLock<RwLock<BTreeMap<String, Constructor>>> = OnceLock::new();
    CONSTRUCTORS.get_or_init(|| RwLock::new(BTreeMap::new()))
}

/// Make a compiler constructor available under `language`.
///
/// # Panics
///
/// Registration is a process-initialisation concern, so misuse is a
/// programmer error: panics when `language` is empty or already registered.
pub fn register(language: &str, constructor: Constructor) {
    assert!(
        !language.is_empty(),
        "compiler register: language cannot be empty"
    );

    let mut map = constructors().write().unwrap();
    if map.contains_key(language) {
        drop(map);
        panic!("compiler register: cannot be called twice for constructor of {language}");
    }
    map.insert(language.to_string(), constructor);
}

/// Sorted list of registered backend languages
#[must_use]
pub fn languages() -> Vec<String> {
    constructors().read().unwrap().keys().cloned().collect()
}

/// Construct the backend compiler registered under `language`.
///
/// # Errors
///
/// Returns [`CompileError::EmptyLanguage`] for an empty name,
/// [`CompileError::UnknownLanguage`] for an unregistered one, and whatever
/// the constructor itself fails with.
pub fn new_compiler(language: &str) -> Result<Box<dyn Compiler>, CompileError> {
    if language.is_empty() {
        return Err(CompileError::EmptyLanguage);
    }
    let constructor = {
        let map = constructors().read().unwrap();
        map.get(language).copied()
    };
    match constructor {
        Some(constructor) => constructor(),
        None => Err(CompileError::UnknownLanguage(language.to_string())),
    }
}
