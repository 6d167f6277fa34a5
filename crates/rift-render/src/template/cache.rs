//! Bounded cache of compiled templates, keyed by template source.
//!
//! Eviction is FIFO by insertion. A bound of 0 disables caching; no bound
//! means the cache grows with the number of distinct templates.

use super::parser::Node;
use crate::metrics;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::trace;

/// A parsed template ready for repeated evaluation.
#[derive(Debug)]
pub struct CompiledTemplate {
    pub(crate) nodes: Vec<Node>,
}

struct CacheState {
    entries: HashMap<String, Arc<CompiledTemplate>>,
    order: VecDeque<String>,
}

pub struct TemplateCache {
    max_entries: Option<usize>,
    state: Mutex<CacheState>,
}

impl TemplateCache {
    pub fn new(max_entries: Option<usize>) -> Self {
        Self {
            max_entries,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Return the cached template for `source`, compiling it on a miss.
    /// Compilation failures are not cached.
    pub fn get_or_compile<E>(
        &self,
        source: &str,
        compile: impl FnOnce(&str) -> Result<CompiledTemplate, E>,
    ) -> Result<Arc<CompiledTemplate>, E> {
        if let Some(found) = self.state.lock().entries.get(source) {
            return Ok(Arc::clone(found));
        }

        let compiled = Arc::new(compile(source)?);
        metrics::TEMPLATES_COMPILED_TOTAL.inc();
        if self.max_entries == Some(0) {
            return Ok(compiled);
        }

        let mut state = self.state.lock();
        if let Some(raced) = state.entries.get(source) {
            return Ok(Arc::clone(raced));
        }
        if let Some(max) = self.max_entries {
            while state.entries.len() >= max {
                match state.order.pop_front() {
                    Some(oldest) => {
                        trace!("Evicting compiled template ({} chars)", oldest.len());
                        state.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
        state.entries.insert(source.to_string(), Arc::clone(&compiled));
        state.order.push_back(source.to_string());
        metrics::TEMPLATE_CACHE_ENTRIES.set(state.entries.len() as i64);
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
        metrics::TEMPLATE_CACHE_ENTRIES.set(0);
    }
}
