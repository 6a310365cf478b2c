//! Handler registry: the set of live call targets, keyed by name.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::invoke::Handler;
use crate::invoke::RegistryError;
use crate::invoke::Result;

/// Concurrent name-to-handler table shared between the dispatcher and
/// whoever registers targets.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its own name. Fails with
    /// [`RegistryError::DuplicateTarget`] if the name is taken.
    pub fn register(&self, handler: Handler) -> Result<()> {
        match self.handlers.entry(handler.name().to_string()) {
            Entry::Occupied(entry) => Err(RegistryError::DuplicateTarget(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(handler));
                Ok(())
            }
        }
    }

    /// Drops the handler and, with it, its whole method table.
    pub fn unregister(&self, name: &str) -> Option<Arc<Handler>> {
        self.handlers.remove(name).map(|(_, handler)| handler)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Handler>> {
        self.handlers.get(name).map(|entry| entry.value().clone())
    }
}
