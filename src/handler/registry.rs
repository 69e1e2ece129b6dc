//! Handler table keyed by `(namespace, name)`

use std::collections::HashMap;

use crate::error::{Result, UnmeshedError};
use crate::types::RegisterEntry;

use super::{HandlerEntry, PermitPool};

/// Lookup key for a registered handler
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub namespace: String,
    pub name: String,
}

impl HandlerKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A registered handler together with the permit pool that enforces its
/// `max_in_progress`
pub struct RegisteredHandler {
    pub entry: HandlerEntry,
    pub pool: PermitPool,
}

/// In-memory registry of handlers. Populated before startup, read-only
/// afterward; no locking is needed on the lookup path.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<HandlerKey, RegisteredHandler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; a duplicate `(namespace, name)` is rejected.
    pub fn register(&mut self, entry: HandlerEntry) -> Result<()> {
        let key = HandlerKey::new(entry.namespace.clone(), entry.name.clone());
        if self.handlers.contains_key(&key) {
            return Err(UnmeshedError::Configuration(format!(
                "handler {key} is already registered"
            )));
        }
        let pool = PermitPool::new(entry.max_in_progress);
        self.handlers.insert(key, RegisteredHandler { entry, pool });
        Ok(())
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&RegisteredHandler> {
        self.handlers
            .get(&HandlerKey::new(namespace, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HandlerKey, &RegisteredHandler)> {
        self.handlers.iter()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registration body entries, one per handler
    pub fn register_entries(&self) -> Vec<RegisterEntry> {
        self.handlers
            .keys()
            .map(|key| RegisterEntry::worker(key.namespace.clone(), key.name.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerEntry;
    use crate::types::HandlerOutput;

    fn echo_entry(namespace: &str, name: &str) -> HandlerEntry {
        HandlerEntry::from_fn(namespace, name, |item| async move {
            Ok(HandlerOutput::Value(serde_json::Value::Object(
                item.input_param,
            )))
        })
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut table = HandlerTable::new();
        table.register(echo_entry("default", "echo")).unwrap();
        assert!(table.register(echo_entry("default", "echo")).is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn lookup_is_keyed_by_namespace_and_name() {
        let mut table = HandlerTable::new();
        table.register(echo_entry("default", "echo")).unwrap();
        table.register(echo_entry("billing", "echo")).unwrap();
        assert!(table.get("default", "echo").is_some());
        assert!(table.get("billing", "echo").is_some());
        assert!(table.get("default", "missing").is_none());
    }

    #[test]
    fn pool_capacity_matches_max_in_progress() {
        let mut table = HandlerTable::new();
        table
            .register(echo_entry("default", "echo").with_max_in_progress(4))
            .unwrap();
        let registered = table.get("default", "echo").unwrap();
        assert_eq!(registered.pool.capacity(), 4);
    }

    #[test]
    fn register_entries_cover_every_handler() {
        let mut table = HandlerTable::new();
        table.register(echo_entry("default", "a")).unwrap();
        table.register(echo_entry("default", "b")).unwrap();
        let mut names: Vec<_> = table
            .register_entries()
            .into_iter()
            .map(|e| e.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }
}
