//! Handler registry (C3): resolves a dotted symbolic name to a callable.
//!
//! Rust has no dynamic module loader, so "resolving a handler name" is a
//! static `HashMap<String, HandlerEntry>` lookup built at process startup,
//! rather than an `importlib`-style dynamic import. Name syntax is still
//! validated against the injection-safety pattern (`transit_core::config`)
//! before the registry is ever consulted.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::builtins;
use crate::handler::HandlerEntry;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("handler '{0}' is not registered")]
    NotFound(String),
    #[error("handler '{0}' is already registered")]
    DuplicateName(String),
}

/// A name-keyed table of invocable handlers. Built once at startup and never
/// mutated afterward (§9 "process-wide state").
pub struct Registry {
    handlers: HashMap<String, HandlerEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// Registry pre-populated with the built-in smoke-test handlers (§4.3,
    /// §10), so a deployment can be end-to-end tested before any bespoke
    /// business handler is wired in.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register("transit.builtin.echo", HandlerEntry::Payload(Arc::new(builtins::Echo)))
            .expect("builtin names are unique");
        registry
            .register(
                "transit.builtin.smoke",
                HandlerEntry::Message(Arc::new(builtins::Smoke)),
            )
            .expect("builtin names are unique");
        registry
    }

    pub fn register(&mut self, name: &str, entry: HandlerEntry) -> Result<(), RegistryError> {
        if self.handlers.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        self.handlers.insert(name.to_string(), entry);
        Ok(())
    }

    /// Resolve a handler by name. The caller is responsible for having
    /// already validated the name's syntax (§4.3) — an unresolvable but
    /// syntactically valid name is still a fatal startup error upstream.
    pub fn resolve(&self, name: &str) -> Result<&HandlerEntry, RegistryError> {
        self.handlers.get(name).ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_resolvable() {
        let registry = Registry::with_builtins();
        assert!(registry.resolve("transit.builtin.echo").is_ok());
        assert!(registry.resolve("transit.builtin.smoke").is_ok());
    }

    #[test]
    fn unknown_name_is_not_found() {
        let registry = Registry::with_builtins();
        assert!(matches!(
            registry.resolve("nothing.here"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = Registry::new();
        registry
            .register("a.b", HandlerEntry::Payload(Arc::new(builtins::Echo)))
            .unwrap();
        let err = registry
            .register("a.b", HandlerEntry::Payload(Arc::new(builtins::Echo)))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(_)));
    }
}
