//! Handler set registered from Rust code at runtime.

use std::sync::Arc;

use dashmap::DashMap;

use super::{Handler, HandlerArgs, HandlerLookup, HandlerResult, HandlerSet};

/// Callbacks keyed by callback name (`on_user_joined`, ...).
///
/// Registration may happen from any thread while the dispatcher is looking
/// callbacks up. Never stale.
#[derive(Default)]
pub struct CallbackSet {
    callbacks: DashMap<String, Arc<dyn Handler>>,
}

impl CallbackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` under `name`, replacing any previous one.
    pub fn register<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn(&HandlerArgs) -> HandlerResult + Send + Sync + 'static,
    {
        self.callbacks.insert(name.into(), Arc::new(callback));
    }

    /// Removes the callback registered under `name`.
    pub fn unregister(&self, name: &str) -> bool {
        self.callbacks.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl HandlerSet for CallbackSet {
    fn lookup(&self, name: &str) -> HandlerLookup {
        match self.callbacks.get(name) {
            Some(entry) => HandlerLookup::Found(Arc::clone(entry.value())),
            None => HandlerLookup::Missing,
        }
    }
}
