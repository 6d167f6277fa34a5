//! In-memory stub store with lifecycle notifications.
//!
//! Listeners are told when all stubs are reset or a single stub is removed;
//! the template engine uses this to drop compiled templates.

use crate::request::Request;
use crate::stub::StubMapping;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Receives stub lifecycle events.
pub trait StubLifecycleListener: Send + Sync {
    fn after_stubs_reset(&self);
    fn after_stub_removed(&self, stub: &StubMapping);
}

pub struct StubRegistry {
    stubs: RwLock<Vec<StubMapping>>,
    listeners: Vec<Arc<dyn StubLifecycleListener>>,
}

impl Default for StubRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StubRegistry {
    pub fn new() -> Self {
        Self {
            stubs: RwLock::new(Vec::new()),
            listeners: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn StubLifecycleListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn add(&self, stub: StubMapping) {
        debug!("Adding stub {:?}", stub.id);
        self.stubs.write().push(stub);
    }

    /// Most recently added matching stub wins.
    pub fn find_match(&self, request: &Request) -> Option<StubMapping> {
        self.stubs
            .read()
            .iter()
            .rev()
            .find(|stub| stub.request.matches(request))
            .cloned()
    }

    pub fn remove(&self, id: &str) -> Option<StubMapping> {
        let removed = {
            let mut stubs = self.stubs.write();
            let index = stubs.iter().position(|s| s.id.as_deref() == Some(id))?;
            stubs.remove(index)
        };
        debug!("Removed stub {}", id);
        for listener in &self.listeners {
            listener.after_stub_removed(&removed);
        }
        Some(removed)
    }

    pub fn reset(&self) {
        self.stubs.write().clear();
        debug!("All stubs reset");
        for listener in &self.listeners {
            listener.after_stubs_reset();
        }
    }

    pub fn len(&self) -> usize {
        self.stubs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.read().is_empty()
    }
}
